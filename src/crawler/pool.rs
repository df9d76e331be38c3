//! Bounded worker pool
//!
//! Independent units (boards, threads, profiles) run concurrently, at most
//! `max_workers` at a time. Each unit stays sequential inside its worker.

use crate::ArchiveError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(max_workers: usize, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            cancel,
        }
    }

    /// Runs `work` for every item and collects the results in completion
    /// order
    ///
    /// Once the run is cancelled no further items are started; units
    /// already running are expected to observe the same token and wind
    /// down. A worker that panics fails the pool after the others have
    /// finished.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> crate::Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let mut tasks = JoinSet::new();
        let mut started = 0usize;

        for item in items {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = self.semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| ArchiveError::Worker(e.to_string()))?
                }
            };

            let unit = work(item);
            tasks.spawn(async move {
                let _permit = permit;
                unit.await
            });
            started += 1;
        }

        if started < total {
            info!(skipped = total - started, "Cancelled before all units started");
        } else {
            debug!(units = total, "All units started");
        }

        let mut results = Vec::with_capacity(started);
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    failure.get_or_insert(e.to_string());
                }
            }
        }

        match failure {
            Some(message) => Err(ArchiveError::Worker(message)),
            None => Ok(results),
        }
    }
}
