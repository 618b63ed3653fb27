use log::{debug, warn};
use lodgen_world::{
    BlockBox, Region, SharedParameters, Stage, StageError, StructureRef, Tile, TileCoord,
};

use crate::context::ThreadContext;
use crate::task::{CancelToken, TaskFailure};

/// Per-stage tally returned by [`StageRunner::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    pub advanced: usize,
    /// Already at or past the stage; left untouched.
    pub skipped: usize,
    /// Advanced but flagged incomplete.
    pub failed: usize,
    /// Outside the region's write radius; left untouched.
    pub refused: usize,
}

/// Advances the requested tiles of a region through one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageRunner {
    stage: Stage,
}

impl StageRunner {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the stage for every halo index in `targets`.
    ///
    /// Tiles already at or past the stage are not touched. Every other target
    /// ends exactly at the stage's marker, with `incomplete` set if the
    /// generator failed for it.
    pub fn run(
        &self,
        params: &SharedParameters,
        ctx: &mut ThreadContext,
        region: &mut Region<'_>,
        targets: &[usize],
        cancel: &CancelToken,
    ) -> Result<StageReport, TaskFailure> {
        if self.stage == Stage::Features {
            return self.run_features(params, region, targets, cancel);
        }
        let mut report = StageReport::default();
        for &index in targets {
            if cancel.is_cancelled() {
                return Err(TaskFailure::Cancelled);
            }
            if !self.writable(region, index, &mut report) {
                continue;
            }
            if region.tile_at(index).is_or_after(self.stage) {
                report.skipped += 1;
                continue;
            }
            let result = match self.stage {
                Stage::StructureStart if !params.generate_structures() => Ok(()),
                Stage::StructureStart => {
                    let result = self.generate(params, region, index);
                    let tile = region.tile_at(index);
                    ctx.structures
                        .on_structure_load(tile.pos(), &tile.structure_starts);
                    result
                }
                Stage::StructureReference => self
                    .cross_reference(ctx, region, index)
                    .and_then(|()| self.generate(params, region, index)),
                _ => self.generate(params, region, index),
            };
            self.finish(region.tile_at_mut(index), result, &mut report);
        }
        Ok(report)
    }

    /// Decoration marks all pending tiles first, then decorates them, so
    /// neighbours see each other as decorated while features spill over.
    fn run_features(
        &self,
        params: &SharedParameters,
        region: &mut Region<'_>,
        targets: &[usize],
        cancel: &CancelToken,
    ) -> Result<StageReport, TaskFailure> {
        let mut report = StageReport::default();
        let mut pending = Vec::with_capacity(targets.len());
        for &index in targets {
            if !self.writable(region, index, &mut report) {
                continue;
            }
            let tile = region.tile_at_mut(index);
            if tile.is_or_after(Stage::Features) {
                report.skipped += 1;
            } else {
                tile.set_stage(Stage::Features);
                pending.push(index);
            }
        }
        let attempts = params.feature_policy().attempts();
        for index in pending {
            if cancel.is_cancelled() {
                return Err(TaskFailure::Cancelled);
            }
            let mut result = Ok(());
            for attempt in 1..=attempts {
                result = self.generate(params, region, index);
                match &result {
                    Ok(()) => break,
                    Err(e) if attempt < attempts => {
                        debug!(target: "lodgen::pipeline", "{e}; retry {attempt}/{}", attempts - 1);
                    }
                    Err(_) => {}
                }
            }
            let tile = region.tile_at_mut(index);
            self.finish(tile, result, &mut report);
            tile.prime_heights();
        }
        Ok(report)
    }

    fn writable(&self, region: &Region<'_>, index: usize, report: &mut StageReport) -> bool {
        let pos = region.tile_at(index).pos();
        if region.can_write(pos) {
            return true;
        }
        warn!(
            target: "lodgen::pipeline",
            "{pos} is outside the write radius around {}; refused for {}",
            region.center(),
            self.stage
        );
        report.refused += 1;
        false
    }

    fn finish(&self, tile: &mut Tile, result: Result<(), StageError>, report: &mut StageReport) {
        if let Err(e) = result {
            warn!(target: "lodgen::pipeline", "{e}; tile skipped");
            tile.incomplete = true;
            report.failed += 1;
        }
        tile.set_stage(self.stage);
        report.advanced += 1;
    }

    /// Hands one tile to the generator with the rest of the region readable.
    fn generate(
        &self,
        params: &SharedParameters,
        region: &mut Region<'_>,
        index: usize,
    ) -> Result<(), StageError> {
        let mut tile = region.take(index);
        let result = {
            let cx = params.stage_context(self.stage, region.view(Some(tile.pos())));
            params.generator().run_stage(&cx, &mut tile)
        };
        region.put(index, tile);
        result
    }

    /// Collects every known start within the reference radius whose bounds
    /// cover the tile. Starts come from the region when it has them and from
    /// the worker's index otherwise.
    fn cross_reference(
        &self,
        ctx: &mut ThreadContext,
        region: &mut Region<'_>,
        index: usize,
    ) -> Result<(), StageError> {
        let pos = region.tile_at(index).pos();
        let footprint = BlockBox::of_tile(pos);
        let radius = ctx.structures.reference_radius();
        let mut found = Vec::new();
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let origin = pos.offset(dx, dz);
                let starts = match region
                    .tile(origin)
                    .filter(|t| t.is_or_after(Stage::StructureStart))
                {
                    Some(t) => t.structure_starts.as_slice(),
                    None => match ctx.structures.starts_at(origin) {
                        Some(starts) => starts,
                        None => continue,
                    },
                };
                for start in starts {
                    if !start.bounds.is_valid() {
                        return Err(malformed(pos, origin));
                    }
                    if start.bounds.intersects(
                        footprint.min_x,
                        footprint.min_z,
                        footprint.max_x,
                        footprint.max_z,
                    ) {
                        found.push(StructureRef {
                            kind: start.kind,
                            origin: start.origin,
                        });
                    }
                }
            }
        }
        let tile = region.tile_at_mut(index);
        for r in found {
            tile.add_reference(r);
        }
        Ok(())
    }
}

fn malformed(tile: TileCoord, origin: TileCoord) -> StageError {
    StageError::new(
        Stage::StructureReference,
        tile,
        format!("structure start from {origin} has malformed bounds"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use lodgen_world::{NoiseGenerator, StructureStart, TileGrid, WorldId};

    fn setup(generate_structures: bool) -> (Arc<SharedParameters>, ThreadContext) {
        let params = Arc::new(
            SharedParameters::new(WorldId(3), 3, Arc::new(NoiseGenerator::new(3)))
                .with_generate_structures(generate_structures),
        );
        let ctx = ThreadContext::new(&params, 8);
        (params, ctx)
    }

    #[test]
    fn structure_start_is_marker_only_when_disabled() {
        let (params, mut ctx) = setup(false);
        let center = TileCoord::new(0, 0);
        let mut grid = TileGrid::from_fn(1, |dx, dz| Tile::placeholder(center.offset(dx, dz)));
        let mut region = Region::new(&mut grid, center, Stage::StructureStart, 1);
        let runner = StageRunner::new(Stage::StructureStart);
        let report = runner
            .run(&params, &mut ctx, &mut region, &[4], &CancelToken::new())
            .unwrap();
        assert_eq!(report.advanced, 1);
        assert_eq!(region.tile_at(4).stage(), Stage::StructureStart);
        assert!(ctx.structures.is_empty());
    }

    #[test]
    fn references_come_from_region_and_index() {
        let (params, mut ctx) = setup(true);
        let center = TileCoord::new(0, 0);
        // outside the region, remembered from an earlier request
        ctx.structures.on_structure_load(
            TileCoord::new(5, 0),
            &[StructureStart {
                kind: 2,
                origin: TileCoord::new(5, 0),
                bounds: BlockBox::new(0, 0, 90, 10),
            }],
        );
        let mut grid = TileGrid::from_fn(1, |dx, dz| {
            let mut t = Tile::placeholder(center.offset(dx, dz));
            t.set_stage(Stage::StructureStart);
            t
        });
        grid.at_mut(3).structure_starts.push(StructureStart {
            kind: 1,
            origin: TileCoord::new(-1, 0),
            bounds: BlockBox::new(-16, 0, 3, 3),
        });
        let mut region = Region::new(&mut grid, center, Stage::StructureStart, 1);
        StageRunner::new(Stage::StructureReference)
            .run(&params, &mut ctx, &mut region, &[4], &CancelToken::new())
            .unwrap();
        let tile = region.tile_at(4);
        assert_eq!(tile.stage(), Stage::StructureReference);
        assert_eq!(tile.structure_refs.len(), 2);
        assert!(!tile.incomplete);
    }

    #[test]
    fn malformed_start_fails_the_tile() {
        let (params, mut ctx) = setup(true);
        let center = TileCoord::new(0, 0);
        let mut grid = TileGrid::from_fn(0, |_, _| {
            let mut t = Tile::placeholder(center);
            t.set_stage(Stage::StructureStart);
            t.structure_starts.push(StructureStart {
                kind: 0,
                origin: center,
                bounds: BlockBox::new(10, 0, 0, 0),
            });
            t
        });
        let mut region = Region::new(&mut grid, center, Stage::StructureStart, 0);
        let report = StageRunner::new(Stage::StructureReference)
            .run(&params, &mut ctx, &mut region, &[0], &CancelToken::new())
            .unwrap();
        assert_eq!(report.failed, 1);
        assert!(region.tile_at(0).incomplete);
        assert_eq!(region.tile_at(0).stage(), Stage::StructureReference);
    }

    #[test]
    fn targets_outside_write_radius_are_refused() {
        let (params, mut ctx) = setup(true);
        let center = TileCoord::new(0, 0);
        let mut grid = TileGrid::from_fn(2, |dx, dz| Tile::placeholder(center.offset(dx, dz)));
        let mut region = Region::new(&mut grid, center, Stage::StructureStart, 1);
        // 12 is the centre, 0 is the corner two tiles out
        for stage in [Stage::StructureStart, Stage::Features] {
            let report = StageRunner::new(stage)
                .run(&params, &mut ctx, &mut region, &[12, 0], &CancelToken::new())
                .unwrap();
            assert_eq!(report.refused, 1);
            assert_eq!(report.advanced, 1);
        }
        assert_eq!(region.tile_at(12).stage(), Stage::Features);
        assert_eq!(region.tile_at(0).stage(), Stage::Empty);
    }

    #[test]
    fn cancelled_runner_stops() {
        let (params, mut ctx) = setup(true);
        let center = TileCoord::new(0, 0);
        let mut grid = TileGrid::from_fn(0, |_, _| Tile::placeholder(center));
        let mut region = Region::new(&mut grid, center, Stage::StructureStart, 0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = StageRunner::new(Stage::StructureStart)
            .run(&params, &mut ctx, &mut region, &[0], &cancel)
            .unwrap_err();
        assert_eq!(err, TaskFailure::Cancelled);
        assert_eq!(region.tile_at(0).stage(), Stage::Empty);
    }
}
