//! The DoMath job handler.

use std::time::Duration;

use async_trait::async_trait;
use domath_core::{CompleteJobCommand, FailJobCommand, Job, JobError, MathVariables};
use domath_worker::{HandlerError, JobClient, JobHandler};
use tracing::{debug, info, warn};

/// Adds `add` into `count` and completes the job with the result.
#[derive(Debug, Clone, Default)]
pub struct MathJobHandler {
    retry_back_off: Option<Duration>,
}

impl MathJobHandler {
    /// Create a new handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: ask the engine to wait this long before re-offering a
    /// failed job.
    pub fn with_retry_back_off(mut self, back_off: Duration) -> Self {
        self.retry_back_off = Some(back_off);
        self
    }

    /// Everything up to, and including, building the completion command.
    /// Errors here are job-level and go to the failure path.
    fn prepare(&self, job: &Job) -> Result<CompleteJobCommand, JobError> {
        // Only presence matters; header contents are not used.
        job.custom_headers_as_map()?;

        let mut vars: MathVariables = job.variables_as()?;
        for field in MathVariables::missing_fields(&job.variables) {
            warn!("Job {} has no variable {}, using 0", job.key, field);
        }
        debug!("Job {} incoming variables: {:?}", job.key, vars);

        vars.apply();
        debug!("Job {} outgoing variables: {:?}", job.key, vars);

        CompleteJobCommand::new(job.key).variables_from(&vars)
    }

    async fn fail(
        &self,
        client: &dyn JobClient,
        job: &Job,
        error: JobError,
    ) -> Result<(), HandlerError> {
        let mut command = FailJobCommand::for_job(job, error.kind(), &error);
        if let Some(back_off) = self.retry_back_off {
            command = command.with_retry_back_off(back_off.as_millis() as u64);
        }
        warn!(
            "Failing job {} ({}), {} retries left",
            job.key, error, command.retries
        );

        client.fail_job(command).await.map_err(|e| {
            HandlerError::Fatal(format!("failed to fail job {}: {}", job.key, e))
        })
    }
}

#[async_trait]
impl JobHandler for MathJobHandler {
    async fn handle(&self, client: &dyn JobClient, job: Job) -> Result<(), HandlerError> {
        debug!("Handling job {} of type {}", job.key, job.job_type);

        let command = match self.prepare(&job) {
            Ok(command) => command,
            Err(error) => return self.fail(client, &job, error).await,
        };

        client.complete_job(command).await.map_err(|e| {
            HandlerError::Fatal(format!("failed to complete job {}: {}", job.key, e))
        })?;

        info!("Completed job {} of type {}", job.key, job.job_type);
        Ok(())
    }
}
