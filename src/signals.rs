//! Signal handling for graceful shutdown.

/// Resolve on the first Ctrl-C (SIGINT).
///
/// If the handler cannot be installed the error is logged and the future
/// resolves at once, so callers shut down instead of running unstoppable.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("interrupted, shutting down"),
        Err(e) => tracing::error!(error = %e, "failed to install Ctrl-C handler, shutting down"),
    }
}
