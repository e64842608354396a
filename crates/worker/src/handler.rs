//! Job handler and job client abstractions.

use std::sync::Arc;

use async_trait::async_trait;
use domath_core::{CompleteJobCommand, FailJobCommand, Job};
use domath_gateway::{GatewayClient, GatewayError};

/// Commands a handler may issue for the job it was given.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Complete the job.
    async fn complete_job(&self, command: CompleteJobCommand) -> Result<(), GatewayError>;

    /// Fail the job.
    async fn fail_job(&self, command: FailJobCommand) -> Result<(), GatewayError>;
}

/// Handles jobs delivered by a [`crate::JobWorker`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handle one job. Invoked concurrently for different jobs.
    async fn handle(&self, client: &dyn JobClient, job: Job) -> Result<(), HandlerError>;
}

/// Errors a handler can report to its worker.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Unrecoverable; the worker stops
    #[error("fatal: {0}")]
    Fatal(String),
}

/// [`JobClient`] backed by a gateway connection.
#[derive(Clone)]
pub struct GatewayJobClient {
    gateway: Arc<dyn GatewayClient>,
}

impl GatewayJobClient {
    /// Wrap a gateway.
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl JobClient for GatewayJobClient {
    async fn complete_job(&self, command: CompleteJobCommand) -> Result<(), GatewayError> {
        self.gateway.complete_job(&command).await
    }

    async fn fail_job(&self, command: FailJobCommand) -> Result<(), GatewayError> {
        self.gateway.fail_job(&command).await
    }
}
