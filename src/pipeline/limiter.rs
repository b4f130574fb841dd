// src/pipeline/limiter.rs
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds the number of pipeline items in flight at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be > 0");
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max: max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max
    }

    pub fn in_flight(&self) -> usize {
        self.max.saturating_sub(self.semaphore.available_permits())
    }

    /// Wait for a slot, then drive `fut` to completion while holding it.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("Concurrency limiter closed")?;
        Ok(fut.await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_is_rejected() {
        assert!(ConcurrencyLimiter::new(0).is_err());
    }

    #[tokio::test]
    async fn test_run_never_exceeds_limit() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..12).map(|i| {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            async move {
                limiter
                    .run(async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        i
                    })
                    .await
            }
        }))
        .await;

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.in_flight(), 0);
    }
}
