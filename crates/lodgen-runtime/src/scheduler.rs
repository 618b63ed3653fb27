use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use log::{debug, info, warn};
use lodgen_world::config::GenConfig;
use lodgen_world::{GenerationMode, SharedParameters, Stage, TILE_SIZE, TileCoord};

use crate::pipeline::Pipeline;
use crate::pool::WorkerPool;
use crate::sink::TileSink;
use crate::task::{RequestId, RequestJob, TaskFailure, TaskHandle, panic_message};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenError {
    ShutDown,
    InvalidTarget(Stage),
    OutOfRange { x: i32, z: i32, radius: u32 },
    Spawn(String),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::ShutDown => write!(f, "scheduler is shut down"),
            GenError::InvalidTarget(stage) => write!(f, "{stage} is not a valid target stage"),
            GenError::OutOfRange { x, z, radius } => {
                write!(f, "[{x}, {z}] r={radius} does not fit in the tile range")
            }
            GenError::Spawn(e) => write!(f, "failed to spawn worker: {e}"),
        }
    }
}

impl std::error::Error for GenError {}

/// Aligns `(x, z)` to the centre of its `2r+1` cell.
///
/// Cells cut by the ends of the `i32` range resolve to their inward
/// neighbour. Returns `None` when no centre of that size is representable.
pub fn snap_center(x: i32, z: i32, radius: u32) -> Option<TileCoord> {
    let r = i64::from(radius);
    let size = 2 * r + 1;
    let snap = |v: i32| {
        let mut c = i64::from(v).div_euclid(size) * size + r;
        if c > i64::from(i32::MAX) {
            c -= size;
        } else if c < i64::from(i32::MIN) {
            c += size;
        }
        i32::try_from(c).ok()
    };
    Some(TileCoord::new(snap(x)?, snap(z)?))
}

/// Coarse overlap test used for admission: rejects when the closer axis is
/// within the combined radii.
pub fn halos_overlap(a: TileCoord, ra: u32, b: TileCoord, rb: u32) -> bool {
    let closer = a.x.abs_diff(b.x).min(a.z.abs_diff(b.z));
    u64::from(closer) <= u64::from(ra) + u64::from(rb)
}

/// Whether every block of the halo around `center` is addressable.
fn halo_in_range(center: TileCoord, halo: u32) -> bool {
    let limit = i64::from(i32::MAX / TILE_SIZE) - 1;
    let reach = i64::from(halo);
    i64::from(center.x).abs() + reach <= limit && i64::from(center.z).abs() + reach <= limit
}

/// An admitted request and the handle of its task.
pub struct GenerationRequest {
    id: RequestId,
    center: TileCoord,
    radius: u32,
    target: Stage,
    created: Instant,
    handle: TaskHandle,
}

impl GenerationRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn center(&self) -> TileCoord {
        self.center
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn target(&self) -> Stage {
        self.target
    }

    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }
}

/// What one reclamation pass removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl ReclaimReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.timed_out
    }
}

/// Admits requests, runs them on the worker pool and reclaims them.
///
/// Owned and driven by a single thread; nothing here blocks.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    sink: Arc<dyn TileSink>,
    in_flight: Vec<GenerationRequest>,
    next_id: u64,
    timeout: Duration,
    shut_down: bool,
}

impl Scheduler {
    pub fn new(params: Arc<SharedParameters>, config: &GenConfig, sink: Arc<dyn TileSink>) -> Self {
        let pipeline = Arc::new(Pipeline::new(params, config.pipeline.clone()));
        Self {
            pipeline,
            pool: WorkerPool::new(
                config.scheduler.worker_keep_alive(),
                config.scheduler.max_workers,
            ),
            sink,
            in_flight: Vec::new(),
            next_id: 0,
            timeout: config.scheduler.timeout(),
            shut_down: false,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snaps the point to its cell and starts a task unless the cell's halo
    /// overlaps a request already in flight. `Ok(false)` means rejected.
    pub fn try_add_point(
        &mut self,
        x: i32,
        z: i32,
        radius: u32,
        target: Stage,
    ) -> Result<bool, GenError> {
        if self.shut_down {
            return Err(GenError::ShutDown);
        }
        if target == Stage::Empty {
            return Err(GenError::InvalidTarget(target));
        }
        let halo = self.pipeline.config().halo_radius(radius);
        let center = snap_center(x, z, radius)
            .filter(|c| halo_in_range(*c, halo))
            .ok_or(GenError::OutOfRange { x, z, radius })?;
        if let Some(other) = self
            .in_flight
            .iter()
            .find(|r| halos_overlap(center, radius, r.center, r.radius))
        {
            debug!(
                target: "lodgen::sched",
                "rejected {center} r={radius}: overlaps {} at {}", other.id, other.center
            );
            return Ok(false);
        }
        self.spawn(center, radius, target)?;
        Ok(true)
    }

    pub fn submit(&mut self, center: TileCoord, radius: u32, target: Stage) -> Result<bool, GenError> {
        self.try_add_point(center.x, center.z, radius, target)
    }

    pub fn submit_mode(
        &mut self,
        center: TileCoord,
        radius: u32,
        mode: GenerationMode,
    ) -> Result<bool, GenError> {
        self.submit(center, radius, mode.target_stage())
    }

    fn spawn(&mut self, center: TileCoord, radius: u32, target: Stage) -> Result<(), GenError> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        let job = RequestJob::new(id, center, radius, target);
        let (outcome_tx, outcome_rx) = bounded(1);
        let handle = TaskHandle::new(&job, outcome_rx);
        let pipeline = self.pipeline.clone();
        let sink = self.sink.clone();
        self.pool.execute(Box::new(move |slot| {
            let run = panic::catch_unwind(AssertUnwindSafe(|| {
                pipeline.run_request(slot, &job, sink.as_ref())
            }));
            let outcome = match run {
                Ok(outcome) => outcome,
                Err(payload) => {
                    // context may be half-updated
                    *slot = None;
                    Err(TaskFailure::Panicked(panic_message(payload.as_ref())))
                }
            };
            let _ = outcome_tx.send(outcome);
        }))?;
        debug!(target: "lodgen::sched", "{id}: admitted {center} r={radius} -> {target}");
        self.in_flight.push(GenerationRequest {
            id,
            center,
            radius,
            target,
            created: Instant::now(),
            handle,
        });
        Ok(())
    }

    /// Removes finished requests and cancels ones whose watchdog went stale.
    pub fn update_all_futures(&mut self) -> ReclaimReport {
        let timeout = self.timeout;
        let mut report = ReclaimReport::default();
        self.in_flight.retain(|req| match req.handle.try_outcome() {
            Some(Ok(())) => {
                debug!(target: "lodgen::sched", "{}: completed in {:?}", req.id, req.age());
                report.completed += 1;
                false
            }
            Some(Err(failure)) => {
                warn!(target: "lodgen::sched", "{}: {failure}", req.id);
                report.failed += 1;
                false
            }
            None if req.handle.since_refresh() > timeout => {
                req.handle.cancel();
                warn!(target: "lodgen::sched", "{}: timed out and terminated", req.id);
                report.timed_out += 1;
                false
            }
            None => true,
        });
        report
    }

    pub fn poll(&mut self) -> ReclaimReport {
        self.update_all_futures()
    }

    /// Cancels everything in flight and stops the pool. Further submissions fail.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for req in &self.in_flight {
            req.handle.cancel();
        }
        info!(
            target: "lodgen::sched",
            "shutting down; cancelled {} in-flight request(s)",
            self.in_flight.len()
        );
        self.in_flight.clear();
        self.pool.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn requests(&self) -> impl Iterator<Item = &GenerationRequest> {
        self.in_flight.iter()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn perf_report(&self) -> Option<String> {
        self.pipeline.perf_report()
    }

    pub fn live_workers(&self) -> usize {
        self.pool.live_workers()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_uses_floor_alignment() {
        assert_eq!(snap_center(5, 5, 0), Some(TileCoord::new(5, 5)));
        assert_eq!(snap_center(0, 0, 1), Some(TileCoord::new(1, 1)));
        assert_eq!(snap_center(-1, 4, 1), Some(TileCoord::new(-2, 4)));
        assert_eq!(snap_center(-3, -4, 2), Some(TileCoord::new(-3, -3)));
    }

    #[test]
    fn snap_stays_inside_i32() {
        assert_eq!(snap_center(i32::MIN, i32::MAX, 1), Some(TileCoord::new(i32::MIN, i32::MAX)));
        // both end cells are centred outside the range and step inward
        let c = snap_center(i32::MAX, i32::MIN, 3).unwrap();
        assert_eq!(c, TileCoord::new(i32::MAX - 5, i32::MIN + 5));
        assert_eq!(c.x.rem_euclid(7), 3);
        assert_eq!(c.z.rem_euclid(7), 3);
        assert_eq!(snap_center(0, 0, u32::MAX), None);
    }

    #[test]
    fn overlap_uses_closer_axis() {
        let a = TileCoord::new(0, 0);
        assert!(halos_overlap(a, 0, a, 0));
        assert!(halos_overlap(a, 1, TileCoord::new(2, 40), 1));
        assert!(!halos_overlap(a, 1, TileCoord::new(3, 40), 1));
        let far = TileCoord::new(i32::MIN, i32::MIN);
        assert!(!halos_overlap(far, 0, TileCoord::new(i32::MAX, 50), 0));
        assert!(halos_overlap(far, u32::MAX, TileCoord::new(i32::MAX, i32::MAX), u32::MAX));
    }
}
