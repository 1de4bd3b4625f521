//! Graceful shutdown signal (spec.md §6 "Graceful shutdown on
//! `SIGINT`/`SIGTERM`"), grounded in the teacher's
//! `turbomcp-server::server::shutdown` handle — here a free function
//! since `mcprt-cli` has no multi-service coordination to do, just one
//! process waiting to drain and exit.

use tracing::info;

/// Resolves once either `SIGINT` (Ctrl-C) or `SIGTERM` arrives. On
/// platforms without Unix signals (tests, non-Unix targets) this reduces
/// to Ctrl-C alone.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
