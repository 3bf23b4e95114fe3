//! Configuration models and the worker-count policy.

pub mod workers;

pub use workers::{WorkerCountPolicy, MAX_WORKERS, MIN_WORKERS, WORKER_COUNT_ENV};
