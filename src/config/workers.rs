//! Worker-count policy: operator override with a CPU-derived baseline.

use tracing::warn;

/// Environment variable carrying the operator override for the worker count.
pub const WORKER_COUNT_ENV: &str = "CENTRAL_WORK_QUEUE_WORKERS";

/// Smallest accepted override value.
pub const MIN_WORKERS: usize = 1;

/// Largest accepted override value.
pub const MAX_WORKERS: usize = 100;

/// Floor applied to the CPU-derived baseline, so independent units still run
/// in parallel on single-core hosts.
const BASELINE_FLOOR: usize = 2;

/// Derives the worker-pool size, read once at queue construction.
///
/// An override that parses as an integer within `1..=100` wins; anything
/// malformed or out of range falls back to the baseline of one worker per
/// available CPU, never below two. Invalid overrides are never fatal.
#[derive(Debug, Clone)]
pub struct WorkerCountPolicy {
    override_value: Option<String>,
    cpus: usize,
}

impl WorkerCountPolicy {
    /// Policy from an explicit override value and CPU count.
    #[must_use]
    pub fn new(override_value: Option<String>, cpus: usize) -> Self {
        Self {
            override_value,
            cpus,
        }
    }

    /// Policy from the host environment: `.env` is loaded if present, then
    /// [`WORKER_COUNT_ENV`] is consulted and the CPU count detected.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::new(std::env::var(WORKER_COUNT_ENV).ok(), num_cpus::get())
    }

    /// The number of workers the queue should start.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if let Some(raw) = &self.override_value {
            match raw.trim().parse::<usize>() {
                Ok(count) if (MIN_WORKERS..=MAX_WORKERS).contains(&count) => return count,
                Ok(count) => {
                    warn!(count, "worker count override out of range, using baseline");
                }
                Err(_) => {
                    warn!(value = %raw, "worker count override is not a number, using baseline");
                }
            }
        }
        self.baseline()
    }

    fn baseline(&self) -> usize {
        self.cpus.max(BASELINE_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_override_is_honored() {
        let policy = WorkerCountPolicy::new(Some("8".to_string()), 4);
        assert_eq!(policy.worker_count(), 8);
    }

    #[test]
    fn test_override_bounds_are_inclusive() {
        assert_eq!(
            WorkerCountPolicy::new(Some("1".to_string()), 4).worker_count(),
            1
        );
        assert_eq!(
            WorkerCountPolicy::new(Some("100".to_string()), 4).worker_count(),
            100
        );
    }

    #[test]
    fn test_out_of_range_override_falls_back() {
        assert_eq!(
            WorkerCountPolicy::new(Some("0".to_string()), 4).worker_count(),
            4
        );
        assert_eq!(
            WorkerCountPolicy::new(Some("101".to_string()), 4).worker_count(),
            4
        );
    }

    #[test]
    fn test_malformed_override_falls_back() {
        assert_eq!(
            WorkerCountPolicy::new(Some("many".to_string()), 4).worker_count(),
            4
        );
        assert_eq!(
            WorkerCountPolicy::new(Some("".to_string()), 4).worker_count(),
            4
        );
        assert_eq!(
            WorkerCountPolicy::new(Some("-2".to_string()), 4).worker_count(),
            4
        );
    }

    #[test]
    fn test_single_core_host_gets_floor_of_two() {
        assert_eq!(WorkerCountPolicy::new(None, 1).worker_count(), 2);
    }

    #[test]
    fn test_baseline_scales_with_cpus() {
        assert_eq!(WorkerCountPolicy::new(None, 16).worker_count(), 16);
    }
}
