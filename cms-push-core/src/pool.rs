//! Bounded-concurrency pool shared by every batch of one pipeline run.

use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;

use crate::config::DEFAULT_CONCURRENCY;
use crate::error::UploadFolderError;

/// Runs upload tasks with at most `limit` of them in flight.
///
/// The pool is owned by the caller and handed to the pipeline, so one run uses
/// a single concurrency ceiling across all of its batches.
#[derive(Debug, Clone)]
pub struct UploadPool {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Default for UploadPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl UploadPool {
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Spawns every task of a batch and waits until all of them have finished.
    ///
    /// Returns the first error as soon as it happens. Tasks that are already
    /// running are not aborted and keep going in the background.
    pub async fn run_batch<T, Fut>(
        &self,
        tasks: impl IntoIterator<Item = Fut>,
    ) -> Result<Vec<T>, UploadFolderError>
    where
        Fut: Future<Output = Result<T, UploadFolderError>> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let permits = Arc::clone(&self.permits);
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| UploadFolderError::PoolClosed)?;
                    task.await
                })
            })
            .collect();

        try_join_all(handles.into_iter().map(|handle| async move {
            handle
                .await
                .map_err(UploadFolderError::Task)
                .and_then(|result| result)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::UploadError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_the_limit() {
        let pool = UploadPool::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, UploadFolderError>(i)
            }
        });

        let mut results = pool.run_batch(tasks).await.unwrap();
        results.sort_unstable();
        assert_eq!(results, (0..12).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_error_is_returned() {
        let pool = UploadPool::new(2);
        let tasks = (0..4).map(|i| async move {
            if i == 2 {
                Err(UploadFolderError::Fatal(UploadError::fatal("unauthorized")))
            } else {
                Ok(i)
            }
        });

        let err = pool.run_batch(tasks).await.unwrap_err();
        assert!(matches!(err, UploadFolderError::Fatal(_)));
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let pool = UploadPool::default();
        let tasks: Vec<std::future::Ready<Result<(), UploadFolderError>>> = Vec::new();
        assert!(pool.run_batch(tasks).await.unwrap().is_empty());
        assert_eq!(pool.limit(), DEFAULT_CONCURRENCY);
    }
}
