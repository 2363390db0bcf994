//! Background rebuild scheduling.
//!
//! Logical-expiry readers never wait for a rebuild; they hand it to a
//! [`RebuildScheduler`] and return the stale value. The scheduler owns the
//! concurrency bound: a [`WorkerPool`] runs at most `workers` rebuilds at a
//! time and rejects submissions once its queue is full.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A boxed rebuild, ready to run on any worker.
pub type RebuildTask = BoxFuture<'static, Result<()>>;

/// Executor for background rebuilds.
pub trait RebuildScheduler: Send + Sync + 'static {
    /// Hand `task` (rebuilding `key`) to the scheduler.
    ///
    /// # Errors
    /// Returns `Error::SchedulerUnavailable` if the task was not accepted.
    /// A rejected task is dropped without running.
    fn submit(&self, key: String, task: RebuildTask) -> impl Future<Output = Result<()>> + Send;
}

impl<S: RebuildScheduler> RebuildScheduler for Arc<S> {
    fn submit(&self, key: String, task: RebuildTask) -> impl Future<Output = Result<()>> + Send {
        (**self).submit(key, task)
    }
}

struct Job {
    key: String,
    task: RebuildTask,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of worker pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    /// Rebuilds that returned an error or panicked.
    pub failed: u64,
}

/// Fixed-size pool of Tokio tasks draining a bounded queue.
///
/// ```ignore
/// let pool = WorkerPool::start(SchedulerConfig::default())?;
/// pool.submit("shop:1".to_string(), async { Ok(()) }.boxed()).await?;
/// pool.shutdown().await;
/// ```
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn the workers on the current Tokio runtime.
    ///
    /// # Errors
    /// - `Error::ConfigError`: zero workers or zero queue capacity
    /// - `Error::SchedulerUnavailable`: called outside a Tokio runtime
    pub fn start(config: SchedulerConfig) -> Result<Self> {
        if config.workers == 0 || config.queue_capacity == 0 {
            return Err(Error::ConfigError(
                "rebuild pool needs at least one worker and one queue slot".to_string(),
            ));
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::SchedulerUnavailable(format!("no Tokio runtime: {}", e)))?;

        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..config.workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let counters = Arc::clone(&counters);
                handle.spawn(run_worker(worker_id, receiver, counters))
            })
            .collect();

        info!(
            "✓ Rebuild pool started ({} workers, queue {})",
            config.workers, config.queue_capacity
        );

        Ok(WorkerPool {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        })
    }

    /// Stop accepting tasks, let queued ones finish, and join the workers.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().await.take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Rebuild worker ended abnormally: {}", e);
            }
        }
        info!("✓ Rebuild pool shut down ({:?})", self.stats());
    }

    pub async fn is_shut_down(&self) -> bool {
        self.sender.lock().await.is_none()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl RebuildScheduler for WorkerPool {
    async fn submit(&self, key: String, task: RebuildTask) -> Result<()> {
        let sender = self.sender.lock().await;
        let sender = match sender.as_ref() {
            Some(sender) => sender,
            None => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(Error::SchedulerUnavailable(
                    "rebuild pool is shut down".to_string(),
                ));
            }
        };

        match sender.try_send(Job { key, task }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(Error::SchedulerUnavailable(format!(
                    "rebuild queue full, dropping rebuild of {}",
                    job.key
                )))
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(Error::SchedulerUnavailable(format!(
                    "rebuild pool closed, dropping rebuild of {}",
                    job.key
                )))
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<Counters>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(Job { key, task }) = job else {
            debug!("Rebuild worker {} exiting", worker_id);
            return;
        };

        match AssertUnwindSafe(task).catch_unwind().await {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!("✓ Worker {} rebuilt {}", worker_id, key);
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Rebuild of {} failed on worker {}: {}", key, worker_id, e);
            }
            Err(_) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("Rebuild of {} panicked on worker {}", key, worker_id);
            }
        }
    }
}

/// Runs each task to completion inside `submit`.
///
/// Deterministic stand-in for [`WorkerPool`] in tests: when a stale read
/// returns, its rebuild has already finished.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineScheduler;

impl RebuildScheduler for InlineScheduler {
    async fn submit(&self, key: String, task: RebuildTask) -> Result<()> {
        if let Err(e) = task.await {
            warn!("Inline rebuild of {} failed: {}", key, e);
        }
        Ok(())
    }
}
