//! Bounded review queue.
//!
//! A fixed number of worker tasks drain one bounded `mpsc` channel, so at
//! most `workers` reviews run at once and at most `capacity` wait. `submit`
//! waits for room; `try_submit` fails fast with [`QueueError::Full`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, MrResult, QueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 32,
        }
    }
}

impl QueueConfig {
    /// `REVIEW_WORKERS` and `REVIEW_QUEUE_CAPACITY`; both must be at least 1.
    pub fn from_env() -> MrResult<Self> {
        let d = Self::default();
        let cfg = Self {
            workers: crate::config::env_usize("REVIEW_WORKERS", d.workers)?,
            capacity: crate::config::env_usize("REVIEW_QUEUE_CAPACITY", d.capacity)?,
        };
        if cfg.workers == 0 {
            return Err(ConfigError::ZeroLimit { field: "REVIEW_WORKERS" }.into());
        }
        if cfg.capacity == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "REVIEW_QUEUE_CAPACITY",
            }
            .into());
        }
        Ok(cfg)
    }
}

pub struct ReviewQueue<J> {
    tx: mpsc::Sender<J>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl<J: Send + 'static> ReviewQueue<J> {
    /// Spawns the workers on the current tokio runtime.
    pub fn start<F, Fut>(cfg: QueueConfig, handler: F) -> Self
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let capacity = cfg.capacity.max(1);
        let (tx, rx) = mpsc::channel::<J>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        let workers = (0..cfg.workers.max(1))
            .map(|n| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(job) = next else { break };
                        debug!("dispatch: worker {} picked a job", n);
                        handler(job).await;
                    }
                    debug!("dispatch: worker {} stopped", n);
                })
            })
            .collect::<Vec<_>>();

        info!(
            "dispatch: queue started (workers={}, capacity={})",
            workers.len(),
            capacity
        );
        Self {
            tx,
            workers,
            capacity,
        }
    }

    /// Enqueues a job, waiting while the queue is full.
    pub async fn submit(&self, job: J) -> Result<(), QueueError> {
        self.tx.send(job).await.map_err(|_| QueueError::Closed)
    }

    /// Enqueues a job or fails immediately when the queue is full.
    pub fn try_submit(&self, job: J) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Stops accepting jobs, lets workers drain what is queued and joins them.
    pub async fn shutdown(self) {
        let Self { tx, workers, .. } = self;
        drop(tx);
        for handle in workers {
            if let Err(e) = handle.await {
                warn!("dispatch: worker ended abnormally: {}", e);
            }
        }
        info!("dispatch: queue drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_runs_more_than_workers_at_once() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let (r, p, d) = (running.clone(), peak.clone(), done.clone());
        let queue = ReviewQueue::start(
            QueueConfig {
                workers: 2,
                capacity: 4,
            },
            move |_job: u32| {
                let (r, p, d) = (r.clone(), p.clone(), d.clone());
                async move {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    r.fetch_sub(1, Ordering::SeqCst);
                    d.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        for job in 0..10 {
            queue.submit(job).await.unwrap();
        }
        queue.shutdown().await;

        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn try_submit_reports_full_queue() {
        let gate = Arc::new(Semaphore::new(0));
        let started = Arc::new(Notify::new());
        let done = Arc::new(AtomicUsize::new(0));

        let (g, s, d) = (gate.clone(), started.clone(), done.clone());
        let queue = ReviewQueue::start(
            QueueConfig {
                workers: 1,
                capacity: 1,
            },
            move |_job: u32| {
                let (g, s, d) = (g.clone(), s.clone(), d.clone());
                async move {
                    s.notify_one();
                    if let Ok(permit) = g.acquire().await {
                        permit.forget();
                    }
                    d.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        queue.try_submit(1).unwrap();
        started.notified().await; // worker holds job 1
        queue.try_submit(2).unwrap(); // fills the channel
        assert!(matches!(
            queue.try_submit(3),
            Err(QueueError::Full { capacity: 1 })
        ));

        gate.add_permits(8);
        queue.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_limits() {
        let d = QueueConfig::default();
        assert_eq!((d.workers, d.capacity), (2, 32));
    }
}
