//! Server initialization and run loop

use super::config::AppConfig;
use super::loader::load_config;
use crate::api::{api_router, ApiContext};
use anyhow::{Context, Result};
use axum::routing::get;
use jobstream_bus::EventBus;
use jobstream_worker::{worker_client, WorkerClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the bus and the worker client selected by the configuration.
pub fn build_components(config: &AppConfig) -> (EventBus, Arc<dyn WorkerClient>) {
    let bus = EventBus::new(config.bus.clone());
    let worker = worker_client(config.worker.clone(), bus.clone());
    (bus, worker)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn run() -> Result<()> {
    let config = load_config()?;
    let (bus, worker) = build_components(&config);
    info!(
        worker = worker.name(),
        heartbeat_secs = config.bus.heartbeat_secs,
        "Components initialized"
    );

    let ctx = ApiContext::new(bus, worker, config.crawl);
    let app = api_router(&ctx)
        .route("/", get(|| async { "Jobstream" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    // Open SSE streams only end once their channels complete, so the
    // components shut down before the listener drains connections.
    let shutdown_ctx = ctx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_components(&shutdown_ctx);
        })
        .await
        .context("HTTP server error")?;

    info!("Jobstream shutdown complete");
    Ok(())
}

fn shutdown_components(ctx: &ApiContext) {
    let aborted = ctx.inflight.abort_all();
    let stopped = ctx.worker.stop_all();
    ctx.bus.shutdown("server-shutdown");
    info!(aborted, stopped, "Stopped in-flight requests");
}
