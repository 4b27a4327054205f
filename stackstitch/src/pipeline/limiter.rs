//! Bounded concurrency for raster-heavy work.
//!
//! Flattening and overlap estimation hold whole tiles in memory; unlimited
//! parallelism would exhaust it on large scans. [`WorkerLimiter`] is a
//! single semaphore pool: every raster task acquires a permit before it
//! runs and releases it on drop. Tasks at the same DAG level queue on the
//! pool in submission order; ordering of *results* is the assembler's job,
//! not the limiter's.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Default number of concurrent raster workers.
pub const DEFAULT_WORKER_LIMIT: usize = 4;

/// Bounded worker pool guard for raster operations.
#[derive(Debug, Clone)]
pub struct WorkerLimiter {
    semaphore: Arc<Semaphore>,
    permits: usize,
    in_flight: Arc<AtomicUsize>,
    label: &'static str,
}

impl WorkerLimiter {
    /// Creates a limiter with the given number of permits.
    pub fn new(permits: usize, label: &'static str) -> Self {
        assert!(permits > 0, "worker limit must be > 0");
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
            label,
        }
    }

    /// Waits for a free worker slot.
    pub async fn acquire(&self) -> WorkerPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(label = self.label, in_flight, "worker permit acquired");
        WorkerPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of tasks currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Total permit count.
    pub fn capacity(&self) -> usize {
        self.permits
    }
}

/// A held worker slot; dropping it frees the slot.
#[derive(Debug)]
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
