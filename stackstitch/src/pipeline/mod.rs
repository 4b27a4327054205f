//! Shared pipeline plumbing.

mod limiter;

pub use limiter::{WorkerLimiter, WorkerPermit, DEFAULT_WORKER_LIMIT};
