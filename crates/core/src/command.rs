//! Terminal commands a worker sends back for a job.

use serde::{Deserialize, Serialize};

use crate::{FailureKind, Job, JobError, JobKey};

/// Complete a job with output variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteJobCommand {
    /// Job to complete
    pub job_key: JobKey,

    /// Output variables merged into the process scope
    pub variables: serde_json::Value,
}

impl CompleteJobCommand {
    /// Start a completion command without variables.
    pub fn new(job_key: JobKey) -> Self {
        Self {
            job_key,
            variables: serde_json::Value::Object(Default::default()),
        }
    }

    /// Set the output variables from a serializable value.
    pub fn variables_from<T: Serialize>(mut self, variables: &T) -> Result<Self, JobError> {
        self.variables = serde_json::to_value(variables).map_err(JobError::Serialize)?;
        Ok(self)
    }
}

/// Fail a job, handing it back to the engine with a new retry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailJobCommand {
    /// Job to fail
    pub job_key: JobKey,

    /// Retries left after this failure
    pub retries: i32,

    /// Diagnostic shown in the engine, tagged with the failure kind
    pub error_message: Option<String>,

    /// Delay before the job becomes activatable again
    pub retry_back_off_ms: Option<u64>,
}

impl FailJobCommand {
    /// Fail command for `job` with one retry consumed.
    ///
    /// Retries are not clamped at zero; the engine decides what a
    /// non-positive count means.
    pub fn for_job(job: &Job, kind: FailureKind, detail: impl std::fmt::Display) -> Self {
        Self {
            job_key: job.key,
            retries: job.retries.saturating_sub(1),
            error_message: Some(format!("{}: {}", kind, detail)),
            retry_back_off_ms: None,
        }
    }

    /// Builder: set the retry back-off.
    pub fn with_retry_back_off(mut self, millis: u64) -> Self {
        self.retry_back_off_ms = Some(millis);
        self
    }
}
