use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::error::TranscodeError;

/// Bounded executor shared by every in-flight job. Encoder invocations and
/// per-file uploads all pass through here, so total external-process and
/// upload concurrency never exceeds the host CPU count.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool sized to the host CPU count, fixed at process start.
    pub fn with_host_capacity() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` once a worker slot frees up, failing it when `limit`
    /// elapses. Dropping the timed-out future also drops whatever child
    /// process it was driving (`kill_on_drop`).
    pub async fn run<T, F>(&self, limit: Duration, task: F) -> Result<T, TranscodeError>
    where
        F: Future<Output = Result<T, TranscodeError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TranscodeError::PoolClosed)?;

        match tokio::time::timeout(limit, task).await {
            Ok(result) => result,
            Err(_) => Err(TranscodeError::Timeout(limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let active = active.clone();
            let peak = peak.clone();
            pool.run(Duration::from_secs(5), async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(25)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        });

        future::try_join_all(tasks).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn elapsed_limit_becomes_timeout_error() {
        let pool = WorkerPool::new(1);

        let result: Result<(), _> = pool
            .run(Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TranscodeError::Timeout(_))));
    }

    #[tokio::test]
    async fn host_capacity_pool_is_nonzero() {
        assert!(WorkerPool::with_host_capacity().size() >= 1);
    }
}
