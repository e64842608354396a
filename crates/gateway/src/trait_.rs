//! Gateway client abstraction.

use async_trait::async_trait;
use domath_core::{CompleteJobCommand, FailJobCommand, Job};

use crate::{ActivateJobsRequest, Topology};

/// Error type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Invalid client configuration
    #[error("invalid gateway configuration: {0}")]
    Config(String),

    /// Transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status
    #[error("gateway returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Token could not be obtained
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Response body did not have the expected shape
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
}

/// Connection to the orchestration engine's gateway.
///
/// This trait allows different transports to be plugged in; the worker only
/// needs job activation and the two terminal commands.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Fetch the cluster topology. Used as a connectivity check.
    async fn topology(&self) -> Result<Topology>;

    /// Activate up to `request.max_jobs_to_activate` jobs of one type.
    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>>;

    /// Complete a job.
    async fn complete_job(&self, command: &CompleteJobCommand) -> Result<()>;

    /// Fail a job.
    async fn fail_job(&self, command: &FailJobCommand) -> Result<()>;
}
