// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control: a fixed number of concurrent runs plus a bounded
//! wait queue. Anything beyond both is rejected with `Overloaded`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regguard_core::RegguardError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

#[derive(Debug)]
pub struct Admission {
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    queue_capacity: usize,
}

/// Holds a queue slot while waiting for a permit.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Admission {
    pub fn new(max_concurrency: usize, queue_capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            waiting: AtomicUsize::new(0),
            queue_capacity,
        }
    }

    /// Runs that may start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs currently queued for a permit.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a run permit. Dropping the future gives up the queue slot.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, RegguardError> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(permit);
        }

        if self.waiting.fetch_add(1, Ordering::SeqCst) >= self.queue_capacity {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            warn!(queue_capacity = self.queue_capacity, "admission queue full");
            return Err(RegguardError::Overloaded);
        }
        let _slot = QueueSlot(&self.waiting);

        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RegguardError::Internal("admission semaphore closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn admits_up_to_concurrency() {
        let admission = Admission::new(2, 0);
        let _a = admission.admit().await.unwrap();
        let _b = admission.admit().await.unwrap();
        assert_eq!(admission.available(), 0);
        assert!(matches!(admission.admit().await, Err(RegguardError::Overloaded)));
    }

    #[tokio::test]
    async fn queued_run_starts_when_permit_frees() {
        let admission = Arc::new(Admission::new(1, 1));
        let first = admission.admit().await.unwrap();

        let waiter = {
            let admission = Arc::clone(&admission);
            tokio::spawn(async move { admission.admit().await.map(|_| ()) })
        };
        while admission.queued() == 0 {
            tokio::task::yield_now().await;
        }
        // Queue is full now.
        assert!(matches!(admission.admit().await, Err(RegguardError::Overloaded)));

        drop(first);
        waiter.await.unwrap().unwrap();
        assert_eq!(admission.queued(), 0);
    }

    #[tokio::test]
    async fn abandoned_wait_frees_queue_slot() {
        let admission = Admission::new(1, 1);
        let _held = admission.admit().await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), admission.admit()).await;
        assert!(timed_out.is_err());
        assert_eq!(admission.queued(), 0);
    }
}
