//! Concurrency limiting for batch runs
//!
//! Bounds the number of items in flight at once. A permit is held by the
//! task running an item and returned when the task ends, whether it
//! succeeded, failed or panicked.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting admission gate for in-flight tasks
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    /// Number of slots, `Semaphore::MAX_PERMITS` when unbounded
    capacity: usize,

    /// Semaphore backing the slots
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `batch_size` tasks. Zero means unbounded.
    pub fn new(batch_size: usize) -> Self {
        let capacity = if batch_size == 0 {
            Semaphore::MAX_PERMITS
        } else {
            batch_size.min(Semaphore::MAX_PERMITS)
        };

        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Wait until a slot is free and take it
    pub async fn acquire(&self) -> LimiterPermit {
        // The semaphore is private and never closed.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore should not be closed");
        LimiterPermit { _permit: permit }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}
