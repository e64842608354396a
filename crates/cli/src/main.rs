//! DoMath worker - adds numbers for DoMath jobs.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use domath_gateway::{GatewayClient, RestGatewayClient};
use domath_math::MathJobHandler;
use domath_worker::JobWorkerBuilder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod settings;
mod signal;

use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "domath-worker")]
#[command(about = "Job worker that adds `add` into `count` for DoMath jobs", long_about = None)]
pub struct Cli {
    /// Gateway address (host:port or URL)
    #[arg(long, env = "ZEEBE_ADDRESS")]
    pub address: Option<String>,

    /// Job type to subscribe to
    #[arg(long, default_value = domath_core::JOB_TYPE)]
    pub job_type: String,

    /// Worker name (generated when omitted)
    #[arg(long)]
    pub worker_name: Option<String>,

    /// Max jobs handled at once
    #[arg(long, default_value = "32")]
    pub max_jobs_active: u32,

    /// Seconds an activated job stays locked to this worker
    #[arg(long, default_value = "300")]
    pub job_timeout_secs: u64,

    /// Pause between polls that returned no jobs
    #[arg(long, default_value = "100")]
    pub poll_interval_ms: u64,

    /// Seconds a gateway request may take (activation adds its long-poll)
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Delay the engine waits before re-offering a failed job
    #[arg(long)]
    pub retry_back_off_ms: Option<u64>,

    /// OAuth client id
    #[arg(long, env = "ZEEBE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "ZEEBE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "ZEEBE_AUTHORIZATION_SERVER_URL")]
    pub authorization_server_url: Option<String>,

    /// OAuth token audience
    #[arg(long, env = "ZEEBE_TOKEN_AUDIENCE")]
    pub token_audience: Option<String>,

    /// Log level or filter directives (RUST_LOG takes precedence)
    #[arg(long, env = "DOMATH_LOG", default_value = "info")]
    pub log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!("Starting DoMath job worker");
    let settings = Settings::from_cli(&cli)?;

    let gateway = connect(&settings).await?;
    run(gateway, settings).await
}

/// Build the gateway client and check that the gateway answers.
async fn connect(settings: &Settings) -> Result<Arc<dyn GatewayClient>> {
    let client = RestGatewayClient::new(settings.client.clone())
        .context("Failed to create gateway client")?;

    let topology = client
        .topology()
        .await
        .with_context(|| format!("Failed to reach gateway at {}", client.base_url()))?;
    info!(
        "Client connected to {} (gateway {}, {} brokers)",
        client.base_url(),
        topology.gateway_version,
        topology.brokers.len()
    );

    Ok(Arc::new(client))
}

/// Serve jobs until a shutdown signal or a fatal worker error.
async fn run(gateway: Arc<dyn GatewayClient>, settings: Settings) -> Result<()> {
    let mut handler = MathJobHandler::new();
    if let Some(back_off) = settings.retry_back_off {
        handler = handler.with_retry_back_off(back_off);
    }

    let worker = JobWorkerBuilder::new(gateway)
        .config(settings.worker)
        .handler(Arc::new(handler))
        .open()?;

    info!(
        "Job worker {} receiving jobs for {}",
        worker.worker_name(),
        worker.job_type()
    );

    tokio::select! {
        received = signal::wait_for_shutdown() => {
            let received = received?;
            info!("Closing job worker after {}", received);
        }
        _ = worker.closed() => {
            warn!("Job worker stopped on its own");
        }
    }

    worker.close();
    worker.await_close().await?;

    info!("Job worker shut down");
    Ok(())
}
