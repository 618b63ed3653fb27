use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use lodgen_world::{Stage, TileCoord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// Best-effort interrupt flag shared between a request and its task.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Heartbeat a running task refreshes after each stage.
#[derive(Clone, Debug)]
pub struct Watchdog(Arc<Mutex<Instant>>);

impl Watchdog {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn refresh(&self) {
        *self.0.lock().unwrap() = Instant::now();
    }

    pub fn since_refresh(&self) -> Duration {
        self.0.lock().unwrap().elapsed()
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a request's task ended without delivering tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskFailure {
    Panicked(String),
    Cancelled,
    /// The worker went away without reporting an outcome.
    WorkerLost,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Panicked(msg) => write!(f, "task panicked: {msg}"),
            TaskFailure::Cancelled => write!(f, "task cancelled"),
            TaskFailure::WorkerLost => write!(f, "worker lost before reporting"),
        }
    }
}

impl std::error::Error for TaskFailure {}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Everything a worker needs to run one admitted request.
#[derive(Clone, Debug)]
pub struct RequestJob {
    pub id: RequestId,
    pub center: TileCoord,
    pub radius: u32,
    pub target: Stage,
    pub cancel: CancelToken,
    pub watchdog: Watchdog,
}

impl RequestJob {
    pub fn new(id: RequestId, center: TileCoord, radius: u32, target: Stage) -> Self {
        Self {
            id,
            center,
            radius,
            target,
            cancel: CancelToken::new(),
            watchdog: Watchdog::new(),
        }
    }
}

/// Scheduler-side view of a running task.
pub struct TaskHandle {
    cancel: CancelToken,
    watchdog: Watchdog,
    outcome: Receiver<Result<(), TaskFailure>>,
}

impl TaskHandle {
    pub(crate) fn new(job: &RequestJob, outcome: Receiver<Result<(), TaskFailure>>) -> Self {
        Self {
            cancel: job.cancel.clone(),
            watchdog: job.watchdog.clone(),
            outcome,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn since_refresh(&self) -> Duration {
        self.watchdog.since_refresh()
    }

    /// Non-blocking join. `None` while the task is still running.
    pub fn try_outcome(&self) -> Option<Result<(), TaskFailure>> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskFailure::WorkerLost)),
        }
    }
}
