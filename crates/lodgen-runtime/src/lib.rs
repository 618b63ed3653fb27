//! Out-of-band scheduling of staged LOD generation: admission, worker pool,
//! per-request pipeline and reclamation.
#![forbid(unsafe_code)]

mod context;
mod perf;
mod pipeline;
mod pool;
mod scheduler;
mod sink;
mod stages;
mod task;

pub use context::ThreadContext;
pub use perf::{DEFAULT_PERF_WINDOW, PerfCalculator, PerfEvent, Rolling};
pub use pipeline::Pipeline;
pub use pool::{Job, WorkerPool};
pub use scheduler::{
    GenError, GenerationRequest, ReclaimReport, Scheduler, halos_overlap, snap_center,
};
pub use sink::{ChannelSink, Delivery, NullSink, TileSink};
pub use stages::{StageReport, StageRunner};
pub use task::{CancelToken, RequestId, RequestJob, TaskFailure, TaskHandle, Watchdog};
