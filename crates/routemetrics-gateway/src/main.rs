//! routemetrics gateway
//!
//! - Loads `routemetrics.yaml` (or `$ROUTEMETRICS_CONFIG`)
//! - Serves the demo API with per-template metrics on `/metrics`
//! - Drains on Ctrl-C, then logs what was collected

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use routemetrics_core::error::{Result, RouteMetricsError};
use routemetrics_gateway::{app_state::AppState, config, router};

const DEFAULT_CONFIG_PATH: &str = "routemetrics.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "routemetrics-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("ROUTEMETRICS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.gateway.listen.parse().map_err(|e| {
        RouteMetricsError::InvalidConfig(format!("gateway.listen must be a valid SocketAddr: {e}"))
    })?;

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "routemetrics-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RouteMetricsError::Io(format!("bind {listen} failed: {e}")))?;

    let drain = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
            }
            drain.set_draining();
            tracing::info!("shutdown requested, draining");
        })
        .await
        .map_err(|e| RouteMetricsError::Internal(format!("server failed: {e}")))?;

    tracing::info!(series = state.registry().len(), "routemetrics-gateway stopped");
    Ok(())
}
