//! # Worker Pool
//!
//! Bounded pool executing register / unregister jobs for sources whose
//! per-package work is network bound.
//!
//! ## Overview
//!
//! [`WorkerPool::start`] spawns every worker before the first job is
//! produced. Workers share one receiver behind an async mutex and the queue
//! holds a single slot, so a producer waits until a worker is free to take
//! the next job. [`JobQueue::finish`] closes the queue and waits for every
//! worker to drain it; that barrier is what lets the tracker commit the
//! repository digest only after all jobs ran.
//!
//! A panicking job is caught at the worker boundary, logged and handed to
//! [`JobHandler::report_panic`]; the worker keeps consuming. Once the run
//! is cancelled, workers stop taking new jobs.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = WorkerPool::new(25).start(handler, cancel.clone());
//! for job in jobs {
//!     queue.submit(job).await?;
//! }
//! queue.finish().await;
//! ```

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::Package;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Unit of work consumed by the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Register { package: Package, store_logo: bool },
    Unregister { name: String, version: String },
}

impl Job {
    pub fn name(&self) -> &str {
        match self {
            Job::Register { package, .. } => &package.name,
            Job::Unregister { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Job::Register { package, .. } => &package.version,
            Job::Unregister { version, .. } => version,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Job::Register { .. } => "register",
            Job::Unregister { .. } => "unregister",
        };
        write!(f, "{} {}@{}", action, self.name(), self.version())
    }
}

/// Executes jobs on behalf of a source.
///
/// Handlers report their own failures (log and errors collector); the pool
/// only cares that the call returned.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle_register(&self, package: Package, store_logo: bool);

    async fn handle_unregister(&self, name: String, version: String);

    /// Called by the pool after a job for `name`@`version` panicked.
    fn report_panic(&self, name: &str, version: &str);
}

async fn dispatch(handler: &dyn JobHandler, job: Job) {
    match job {
        Job::Register {
            package,
            store_logo,
        } => handler.handle_register(package, store_logo).await,
        Job::Unregister { name, version } => handler.handle_unregister(name, version).await,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    num_workers: usize,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Spawn the workers and return the queue feeding them.
    pub fn start(&self, handler: Arc<dyn JobHandler>, cancel: CancellationToken) -> JobQueue {
        let (sender, receiver) = mpsc::channel::<Job>(1);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..self.num_workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                let cancel = cancel.clone();
                tokio::spawn(run_worker(worker_id, receiver, handler, cancel))
            })
            .collect();

        JobQueue {
            sender,
            workers,
            cancel,
        }
    }

    /// Feed `jobs` to a fresh set of workers and wait until all of them
    /// returned.
    ///
    /// Stops producing at the first job that cannot be handed over because
    /// the run was cancelled; the workers are still joined.
    pub async fn run<I>(&self, handler: Arc<dyn JobHandler>, jobs: I, cancel: CancellationToken) -> Result<()>
    where
        I: IntoIterator<Item = Job>,
    {
        let queue = self.start(handler, cancel);
        let mut outcome = Ok(());
        for job in jobs {
            if let Err(e) = queue.submit(job).await {
                outcome = Err(e);
                break;
            }
        }
        queue.finish().await;
        outcome
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    handler: Arc<dyn JobHandler>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = next else {
            break;
        };

        let description = job.to_string();
        let (name, version) = (job.name().to_string(), job.version().to_string());
        debug!(worker = worker_id, job = %description, "Running job");
        let outcome = AssertUnwindSafe(dispatch(handler.as_ref(), job))
            .catch_unwind()
            .await;
        if outcome.is_err() {
            error!(worker = worker_id, job = %description, "Job panicked");
            handler.report_panic(&name, &version);
        }
    }
    debug!(worker = worker_id, "Worker stopped");
}

/// Producer side of a running pool.
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl JobQueue {
    /// Hand a job to the next free worker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the run is cancelled before a worker
    /// accepts the job.
    pub async fn submit(&self, job: Job) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            sent = self.sender.send(job) => sent.map_err(|_| SyncError::Cancelled),
        }
    }

    /// Close the queue and wait until every worker has returned.
    pub async fn finish(self) {
        let JobQueue {
            sender, workers, ..
        } = self;
        drop(sender);
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Task panicked");
            }
        }
    }
}
