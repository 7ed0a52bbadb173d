//! Run command - start the routes and serve until interrupted

use anyhow::{Context, Result};
use switchyard_config::Config;
use tokio::signal;
use tracing::{info, warn};

use super::build_context;

/// Run the configured routes until SIGINT or SIGTERM
pub async fn run(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        context = %config.global.name,
        routes = config.routes.len(),
        "switchyard starting"
    );
    if config.routes.is_empty() {
        warn!("no routes configured");
    }

    let context = build_context(&config)?;
    context.start().await.context("failed to start routes")?;

    wait_for_shutdown().await;
    info!(
        timeout = ?config.global.shutdown_timeout,
        "shutdown requested, draining routes"
    );

    let stopped = context.stop().await;
    for route in context.routes() {
        let metrics = route.metrics();
        info!(
            route_id = %route.id(),
            total = metrics.exchanges_total,
            completed = metrics.exchanges_completed,
            failed = metrics.exchanges_failed,
            handled = metrics.failures_handled,
            redeliveries = metrics.redeliveries,
            "route summary"
        );
    }
    stopped.context("failed to stop routes")?;

    info!("switchyard shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
