use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use log::debug;

use crate::context::ThreadContext;
use crate::scheduler::GenError;

/// Unit of work; receives the worker's context slot.
pub type Job = Box<dyn FnOnce(&mut Option<ThreadContext>) + Send + 'static>;

/// Cached-thread pool. A job is handed straight to a worker parked on the
/// rendezvous channel; if none is parked a new worker is spawned for it.
/// Workers parked for longer than `keep_alive` exit. With `max_workers`
/// reached, jobs wait in the overflow queue.
pub struct WorkerPool {
    handoff_tx: Option<Sender<Job>>,
    handoff_rx: Receiver<Job>,
    overflow_tx: Option<Sender<Job>>,
    overflow_rx: Receiver<Job>,
    live: Arc<AtomicUsize>,
    spawned: usize,
    keep_alive: Duration,
    max_workers: usize,
}

enum Next {
    Job(Job),
    Idle,
    Closed,
}

impl WorkerPool {
    /// `max_workers == 0` leaves the pool unbounded.
    pub fn new(keep_alive: Duration, max_workers: usize) -> Self {
        let (handoff_tx, handoff_rx) = bounded::<Job>(0);
        let (overflow_tx, overflow_rx) = unbounded::<Job>();
        Self {
            handoff_tx: Some(handoff_tx),
            handoff_rx,
            overflow_tx: Some(overflow_tx),
            overflow_rx,
            live: Arc::new(AtomicUsize::new(0)),
            spawned: 0,
            keep_alive,
            max_workers,
        }
    }

    pub fn execute(&mut self, job: Job) -> Result<(), GenError> {
        let (Some(handoff), Some(overflow)) = (&self.handoff_tx, &self.overflow_tx) else {
            return Err(GenError::ShutDown);
        };
        let job = match handoff.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => job,
        };
        if self.has_room() {
            return self.spawn_worker(Some(job));
        }
        overflow.send(job).map_err(|_| GenError::ShutDown)?;
        // a worker may have left between the two checks
        if self.has_room() {
            self.spawn_worker(None)?;
        }
        Ok(())
    }

    fn has_room(&self) -> bool {
        self.max_workers == 0 || self.live.load(Ordering::SeqCst) < self.max_workers
    }

    fn spawn_worker(&mut self, first: Option<Job>) -> Result<(), GenError> {
        let n = self.spawned;
        self.spawned += 1;
        let handoff = self.handoff_rx.clone();
        let overflow = self.overflow_rx.clone();
        let live = self.live.clone();
        let keep_alive = self.keep_alive;
        live.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(format!("lodgen-worker-{n}"))
            .spawn(move || worker_loop(first, handoff, overflow, live, keep_alive));
        match spawned {
            Ok(_) => {
                debug!(target: "lodgen::pool", "spawned lodgen-worker-{n}");
                Ok(())
            }
            Err(e) => {
                self.live.fetch_sub(1, Ordering::SeqCst);
                Err(GenError::Spawn(e.to_string()))
            }
        }
    }

    /// Stops accepting jobs and drops queued ones. Running jobs finish on
    /// their own; parked workers exit once the channels disconnect.
    pub fn shutdown(&mut self) {
        self.handoff_tx = None;
        self.overflow_tx = None;
        while self.overflow_rx.try_recv().is_ok() {}
    }

    pub fn is_shut_down(&self) -> bool {
        self.handoff_tx.is_none()
    }

    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.overflow_rx.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    first: Option<Job>,
    handoff: Receiver<Job>,
    overflow: Receiver<Job>,
    live: Arc<AtomicUsize>,
    keep_alive: Duration,
) {
    let mut slot: Option<ThreadContext> = None;
    if let Some(job) = first {
        job(&mut slot);
    }
    loop {
        let next = select! {
            recv(handoff) -> msg => msg.map_or(Next::Closed, Next::Job),
            recv(overflow) -> msg => msg.map_or(Next::Closed, Next::Job),
            default(keep_alive) => Next::Idle,
        };
        match next {
            Next::Job(job) => job(&mut slot),
            Next::Idle => {
                live.fetch_sub(1, Ordering::SeqCst);
                if overflow.is_empty() {
                    break;
                }
                live.fetch_add(1, Ordering::SeqCst);
            }
            Next::Closed => {
                live.fetch_sub(1, Ordering::SeqCst);
                break;
            }
        }
    }
    let name = thread::current().name().unwrap_or("lodgen-worker").to_string();
    debug!(target: "lodgen::pool", "{name} exiting");
}
