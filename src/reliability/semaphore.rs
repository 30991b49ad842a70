//! Shared concurrency gate for event handlers
//!
//! Thin wrapper over `tokio::sync::Semaphore` (FIFO-fair, permits released via
//! RAII) that additionally tracks how many acquires are currently parked, for
//! the queue's diagnostic stats. `acquire()` is a plain future, so call sites
//! that need cancellation race it against `tokio::time::timeout`.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug)]
pub struct FlowSemaphore {
    inner: Semaphore,
    waiting: AtomicUsize,
}

impl FlowSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            inner: Semaphore::new(permits),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Wait for a permit. Waiters are served in FIFO order; the permit is
    /// returned to the pool when the guard drops.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitGuard(&self.waiting);
        self.inner
            .acquire()
            .await
            .expect("semaphore is never closed")
    }

    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    pub fn waiting_acquires(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

/// Keeps the waiting counter honest even when an acquire future is dropped
/// mid-wait.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_decrements_available_permits() {
        let semaphore = FlowSemaphore::new(2);
        let permit = semaphore.acquire().await;
        assert_eq!(semaphore.available_permits(), 1);
        drop(permit);
        assert_eq!(semaphore.available_permits(), 2);
    }

    #[tokio::test]
    async fn waiters_are_tracked_and_released_fifo() {
        let semaphore = Arc::new(FlowSemaphore::new(1));
        let held = semaphore.acquire().await;

        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(semaphore.waiting_acquires(), 1);

        drop(held);
        waiter.await.expect("waiter task");
        assert_eq!(semaphore.waiting_acquires(), 0);
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn acquire_can_be_raced_against_timeout() {
        let semaphore = FlowSemaphore::new(1);
        let _held = semaphore.acquire().await;

        let result =
            tokio::time::timeout(Duration::from_millis(10), semaphore.acquire()).await;
        assert!(result.is_err());
        // The abandoned waiter must not leak into the count.
        assert_eq!(semaphore.waiting_acquires(), 0);
    }
}
