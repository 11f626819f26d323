//! Process termination hook
//!
//! Resolves when the orchestrator asks the pod to stop. On Unix this covers
//! SIGINT, SIGTERM (what Kubernetes sends) and SIGQUIT; elsewhere only Ctrl-C.

use tracing::{info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
        _ = sigint.recv() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigquit.recv() => info!("Received SIGQUIT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}

/// Like [`wait_for_shutdown_signal`], falling back to Ctrl-C alone when the
/// signal handlers cannot be installed.
pub async fn shutdown_requested() {
    if let Err(e) = wait_for_shutdown_signal().await {
        warn!("Failed to install signal handlers, listening for Ctrl-C only: {}", e);
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
