use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info};
use lodgen_world::config::PipelineConfig;
use lodgen_world::{GenerationMode, Region, SharedParameters, Stage, Tile, TileCoord, TileGrid};

use crate::context::ThreadContext;
use crate::perf::PerfEvent;
use crate::sink::TileSink;
use crate::stages::StageRunner;
use crate::task::{CancelToken, RequestJob, TaskFailure, Watchdog};

/// Runs requests for one world. Shared by every worker.
pub struct Pipeline {
    params: Arc<SharedParameters>,
    config: PipelineConfig,
    latest_perf: Mutex<Option<String>>,
}

impl Pipeline {
    pub fn new(params: Arc<SharedParameters>, config: PipelineConfig) -> Self {
        Self {
            params,
            config,
            latest_perf: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &Arc<SharedParameters> {
        &self.params
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Most recent report published by a worker with perf logging on.
    pub fn perf_report(&self) -> Option<String> {
        self.latest_perf.lock().unwrap().clone()
    }

    /// Generates the `radius` sub-grid around `center` up to `target` and
    /// returns it. Halo tiles are built and dropped here.
    pub fn generate_direct(
        &self,
        ctx: &mut ThreadContext,
        center: TileCoord,
        radius: u32,
        target: Stage,
        cancel: &CancelToken,
        watchdog: &Watchdog,
    ) -> Result<TileGrid<Tile>, TaskFailure> {
        let mut event = PerfEvent::begin();
        let halo_radius = self.config.halo_radius(radius);
        let mut halo =
            TileGrid::from_fn(halo_radius, |dx, dz| Tile::placeholder(center.offset(dx, dz)));
        watchdog.refresh();

        let mut next = 0usize;
        let indices = TileGrid::from_fn(halo_radius, |_, _| {
            next += 1;
            next - 1
        });
        let targets = indices.sub_grid(radius).into_vec();

        {
            let mut region = Region::new(&mut halo, center, Stage::StructureStart, radius + 1);
            for stage in Stage::PIPELINE {
                if !target.is_or_after(stage) {
                    break;
                }
                if cancel.is_cancelled() {
                    return Err(TaskFailure::Cancelled);
                }
                let t0 = Instant::now();
                let report =
                    StageRunner::new(stage).run(&self.params, ctx, &mut region, &targets, cancel)?;
                event.record(stage, t0.elapsed());
                watchdog.refresh();
                debug!(
                    target: "lodgen::pipeline",
                    "{center} r={radius} {stage}: advanced={} skipped={} failed={} refused={}",
                    report.advanced, report.skipped, report.failed, report.refused
                );
                if stage == target {
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(TaskFailure::Cancelled);
        }
        event.finish();
        if self.config.perf_logging {
            ctx.perf.record(&event);
            let report = ctx.perf.to_string();
            info!(target: "lodgen::pipeline", "perf {}: {report}", ctx.world());
            *self.latest_perf.lock().unwrap() = Some(report);
        }
        Ok(halo.into_sub_grid(radius))
    }

    /// Worker entry point: picks the slot's context, generates, and hands the
    /// result to `sink`. Nothing reaches the sink if the job was cancelled.
    pub fn run_request(
        &self,
        slot: &mut Option<ThreadContext>,
        job: &RequestJob,
        sink: &dyn TileSink,
    ) -> Result<(), TaskFailure> {
        let ctx = ThreadContext::get_or_create_with(slot, &self.params, self.config.perf_window);
        job.watchdog.refresh();
        let grid = self.generate_direct(
            ctx,
            job.center,
            job.radius,
            job.target,
            &job.cancel,
            &job.watchdog,
        )?;
        let mode = GenerationMode::for_stage(job.target).unwrap_or(GenerationMode::None);
        debug!(target: "lodgen::pipeline", "{}: delivering {grid} as {mode:?}", job.id);
        sink.accept(grid, mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodgen_world::{NoiseGenerator, WorldId};

    fn pipeline(perf_logging: bool) -> Pipeline {
        let params = Arc::new(SharedParameters::new(
            WorldId(9),
            9,
            Arc::new(NoiseGenerator::new(9)),
        ));
        Pipeline::new(
            params,
            PipelineConfig {
                perf_logging,
                ..PipelineConfig::default()
            },
        )
    }

    #[test]
    fn first_stage_target_returns_only_requested_tiles() {
        let p = pipeline(false);
        let mut ctx = ThreadContext::new(p.params(), 4);
        let center = TileCoord::new(-3, 8);
        let grid = p
            .generate_direct(
                &mut ctx,
                center,
                1,
                Stage::StructureStart,
                &CancelToken::new(),
                &Watchdog::new(),
            )
            .unwrap();
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.at(grid.center_index()).pos(), center);
        assert!(grid.iter().all(|t| t.stage() == Stage::StructureStart));
        assert!(grid.iter().all(|t| t.pos().chebyshev(center) <= 1));
    }

    #[test]
    fn full_pipeline_fills_tiles() {
        let p = pipeline(true);
        let mut ctx = ThreadContext::new(p.params(), 4);
        let grid = p
            .generate_direct(
                &mut ctx,
                TileCoord::new(0, 0),
                0,
                Stage::Features,
                &CancelToken::new(),
                &Watchdog::new(),
            )
            .unwrap();
        let tile = grid.at(0);
        assert_eq!(tile.stage(), Stage::Features);
        assert_eq!(tile.heightmap.len(), lodgen_world::COLUMNS);
        assert!(p.perf_report().is_some());
        assert_eq!(ctx.perf.requests(), 1);
    }

    #[test]
    fn cancelled_request_delivers_nothing() {
        let p = pipeline(false);
        let mut ctx = ThreadContext::new(p.params(), 4);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = p
            .generate_direct(
                &mut ctx,
                TileCoord::new(0, 0),
                0,
                Stage::Biomes,
                &cancel,
                &Watchdog::new(),
            )
            .unwrap_err();
        assert_eq!(err, TaskFailure::Cancelled);
    }
}
