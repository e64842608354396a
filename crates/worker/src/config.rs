//! Worker policy: concurrency, polling and back-off.

use std::time::Duration;

/// Configuration for a job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Job type to subscribe to
    pub job_type: String,
    /// Worker name recorded on activated jobs
    pub worker_name: String,
    /// Max handlers running at once
    pub max_jobs_active: u32,
    /// How long an activated job stays locked to this worker
    pub timeout: Duration,
    /// Pause after a poll that returned no jobs
    pub poll_interval: Duration,
    /// Long-poll duration requested from the gateway
    pub request_timeout: Duration,
    /// Variables to fetch (None = all)
    pub fetch_variables: Option<Vec<String>>,
    /// Back-off after failed polls
    pub backoff: BackoffConfig,
}

impl WorkerConfig {
    /// Defaults for `job_type`, with a generated worker name.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            worker_name: default_worker_name(),
            max_jobs_active: 32,
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(10),
            fetch_variables: None,
            backoff: BackoffConfig::default(),
        }
    }
}

/// A fresh, unique worker name.
pub fn default_worker_name() -> String {
    format!("domath-{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// Exponential back-off applied between failed polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial: Duration,
    /// Upper bound
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
        }
    }
}

impl BackoffConfig {
    /// Delay after `consecutive_errors` failures in a row (1-based).
    pub fn delay(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
