//! OS shutdown signals.

use anyhow::Result;
use tokio::signal;
use tracing::info;

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signals that trigger a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM, sent by process supervisors
    Terminate,
    /// SIGINT / Ctrl+C
    Interrupt,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Wait for the first shutdown signal.
#[cfg(unix)]
pub async fn wait_for_shutdown() -> Result<ShutdownSignal> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sigint.recv() => ShutdownSignal::Interrupt,
    };
    info!("Received {}", received);
    Ok(received)
}

/// Wait for the first shutdown signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown() -> Result<ShutdownSignal> {
    signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    Ok(ShutdownSignal::Interrupt)
}
