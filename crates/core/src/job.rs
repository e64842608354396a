//! Jobs delivered by the engine.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::JobKey;

/// A job activated for this worker.
///
/// Jobs are owned by the engine; a worker only reads them and answers with a
/// terminal command (complete or fail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job key
    #[serde(rename = "jobKey")]
    pub key: JobKey,

    /// Job type the job was routed by
    #[serde(rename = "type")]
    pub job_type: String,

    /// Remaining retries before the engine raises an incident
    #[serde(default)]
    pub retries: i32,

    /// Name of the worker that activated the job
    #[serde(default)]
    pub worker: String,

    /// Activation deadline (epoch millis)
    #[serde(default)]
    pub deadline: Option<i64>,

    /// Key of the owning process instance
    #[serde(default)]
    pub process_instance_key: Option<JobKey>,

    /// BPMN element the job belongs to
    #[serde(default)]
    pub element_id: Option<String>,

    /// Out-of-band metadata, kept raw until asked for. `Null` when the
    /// gateway sent none.
    #[serde(default)]
    pub custom_headers: serde_json::Value,

    /// Variable payload, kept raw until asked for
    #[serde(default)]
    pub variables: serde_json::Value,

    /// Tenant the job belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Job {
    /// Create a job with empty headers and variables.
    pub fn new(key: impl Into<JobKey>, job_type: impl Into<String>, retries: i32) -> Self {
        Self {
            key: key.into(),
            job_type: job_type.into(),
            retries,
            worker: String::new(),
            deadline: None,
            process_instance_key: None,
            element_id: None,
            custom_headers: serde_json::Value::Object(Default::default()),
            variables: serde_json::Value::Object(Default::default()),
            tenant_id: None,
        }
    }

    /// Builder: set the variable payload.
    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = variables;
        self
    }

    /// Builder: set the custom headers.
    pub fn with_custom_headers(mut self, headers: serde_json::Value) -> Self {
        self.custom_headers = headers;
        self
    }

    /// Custom headers as a string map.
    ///
    /// A missing payload, or anything other than an object of string
    /// values, is an error.
    pub fn custom_headers_as_map(&self) -> Result<HashMap<String, String>, JobError> {
        match &self.custom_headers {
            serde_json::Value::Null => Err(JobError::Headers("no custom headers".to_string())),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(JobError::Headers(format!(
                        "header '{}' is not a string: {}",
                        k, other
                    ))),
                })
                .collect(),
            other => Err(JobError::Headers(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Deserialize the variable payload into `T`.
    pub fn variables_as<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        T::deserialize(&self.variables).map_err(JobError::Variables)
    }
}

/// Why a job was handed to the failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Custom headers could not be read
    Headers,
    /// Variables could not be parsed
    Variables,
    /// Completion command could not be built
    CommandBuild,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Headers => write!(f, "headers"),
            FailureKind::Variables => write!(f, "variables"),
            FailureKind::CommandBuild => write!(f, "command-build"),
        }
    }
}

/// Recoverable, job-level errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Custom headers are not a string map
    #[error("invalid custom headers: {0}")]
    Headers(String),

    /// Variables do not match the expected shape
    #[error("invalid variables: {0}")]
    Variables(#[source] serde_json::Error),

    /// Output variables could not be serialized
    #[error("failed to serialize variables: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl JobError {
    /// Failure kind reported back to the engine.
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Headers(_) => FailureKind::Headers,
            JobError::Variables(_) => FailureKind::Variables,
            JobError::Serialize(_) => FailureKind::CommandBuild,
        }
    }
}
