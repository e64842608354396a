//! Startup settings resolved from flags and environment.

use std::time::Duration;

use domath_gateway::{ClientConfig, OAuthConfig};
use domath_worker::{default_worker_name, WorkerConfig};

use crate::Cli;

/// Token endpoint used when credentials are given without one.
pub const DEFAULT_AUTHORIZATION_SERVER_URL: &str = "https://login.cloud.camunda.io/oauth/token";

/// Invalid startup configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No gateway address
    #[error("ZEEBE_ADDRESS is not set")]
    MissingAddress,

    /// Only one half of the OAuth credentials
    #[error("both ZEEBE_CLIENT_ID and ZEEBE_CLIENT_SECRET must be set to enable OAuth")]
    IncompleteCredentials,

    /// Zero concurrency
    #[error("--max-jobs-active must be at least 1")]
    NoCapacity,
}

/// Everything the worker needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway client configuration
    pub client: ClientConfig,
    /// Job worker policy
    pub worker: WorkerConfig,
    /// Back-off sent with failed jobs
    pub retry_back_off: Option<Duration>,
}

impl Settings {
    /// Resolve settings. Fails before anything connects to the gateway.
    pub fn from_cli(cli: &Cli) -> Result<Self, SettingsError> {
        let address = cli
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(SettingsError::MissingAddress)?;

        if cli.max_jobs_active == 0 {
            return Err(SettingsError::NoCapacity);
        }

        let mut client = ClientConfig::new(address)
            .with_request_timeout(Duration::from_secs(cli.request_timeout_secs));
        match (&cli.client_id, &cli.client_secret) {
            (Some(client_id), Some(client_secret)) => {
                client = client.with_oauth(OAuthConfig {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    authorization_server_url: cli
                        .authorization_server_url
                        .clone()
                        .unwrap_or_else(|| DEFAULT_AUTHORIZATION_SERVER_URL.to_string()),
                    audience: cli.token_audience.clone(),
                });
            }
            (None, None) => {}
            _ => return Err(SettingsError::IncompleteCredentials),
        }

        let mut worker = WorkerConfig::new(cli.job_type.clone());
        worker.worker_name = cli.worker_name.clone().unwrap_or_else(default_worker_name);
        worker.max_jobs_active = cli.max_jobs_active;
        worker.timeout = Duration::from_secs(cli.job_timeout_secs);
        worker.poll_interval = Duration::from_millis(cli.poll_interval_ms);

        Ok(Self {
            client,
            worker,
            retry_back_off: cli.retry_back_off_ms.map(Duration::from_millis),
        })
    }
}
