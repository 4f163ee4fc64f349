//! Vouchsafe verification gateway
//!
//! Single-binary Rust service that:
//! 1. Keeps Vouchsafe API credentials in a local settings file
//! 2. Serves `GET /vouchsafe/request` publicly, redirecting end users into a
//!    hosted identity verification
//! 3. Serves the admin API (settings, verifications, metrics) on a second,
//!    private listener

mod admin;
mod config;
mod endpoint;
mod error;
mod metrics;
#[cfg(test)]
mod test_support;
mod validation;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use kv_store::{FileSettingsStore, MemoryCache};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vouchsafe_api::VouchsafeClient;

use crate::admin::AdminState;
use crate::config::Config;
use crate::endpoint::EndpointState;
use crate::metrics::ServiceMetrics;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the public listener
#[derive(Clone)]
struct AppState {
    endpoint: EndpointState,
    metrics: ServiceMetrics,
}

/// Build the public router.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/vouchsafe/request", get(request_handler))
        .route("/vouchsafe/request/", get(request_handler))
        .route("/health", get(health_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting vouchsafe-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        admin_listen_addr = %config.server.admin_listen_addr,
        base_url = %config.api.base_url,
        settings_path = %config.settings.path.display(),
        allowed_redirect_hosts = config.endpoint.allowed_redirect_hosts.len(),
        "configuration loaded"
    );

    let settings = FileSettingsStore::load(config.settings.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to load settings from {}",
                config.settings.path.display()
            )
        })?;

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let client = Arc::new(VouchsafeClient::new(
        http,
        config.api.client_options(),
        Arc::new(settings),
        Arc::new(MemoryCache::new()),
    ));

    if let Some(update) = config.bootstrap.take() {
        client
            .update_credentials(update)
            .await
            .context("failed to seed credentials from environment")?;
        info!("credentials seeded from environment");
    }

    let credentials = client
        .credentials()
        .await
        .context("failed to read stored credentials")?;
    if credentials.is_complete() {
        info!(client_id = %credentials.client_id, "API credentials configured");
    } else {
        warn!("API credentials incomplete, requests will fail until set via the admin API");
    }

    let metrics = ServiceMetrics::new();

    let app_state = AppState {
        endpoint: EndpointState {
            client: client.clone(),
            allowed_redirect_hosts: Arc::new(config.endpoint.allowed_redirect_hosts.clone()),
            requests_total: metrics.requests_total.clone(),
            errors_total: metrics.errors_total.clone(),
        },
        metrics,
    };

    let app = build_router(app_state, config.server.max_connections);
    let admin_app = admin::build_admin_router(AdminState::new(
        client,
        &config.api.dashboard_url,
        prometheus_handle,
    ));

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    let admin_addr = config.server.admin_listen_addr;
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("failed to bind admin listener to {admin_addr}"))?;

    info!(addr = %listen_addr, admin_addr = %admin_addr, "accepting requests");

    // Both servers drain on the same signal; DRAIN_TIMEOUT starts when it fires.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public_rx = shutdown_rx.clone();
    let public_server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_requested(public_rx))
            .await
    });
    let admin_server = tokio::spawn(async move {
        axum::serve(admin_listener, admin_app)
            .with_graceful_shutdown(shutdown_requested(shutdown_rx))
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let drained = async { tokio::join!(public_server, admin_server) };
    match tokio::time::timeout(DRAIN_TIMEOUT, drained).await {
        Ok((public, admin)) => {
            report_server_exit("public", public);
            report_server_exit("admin", admin);
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

fn report_server_exit(
    name: &str,
    result: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => info!(server = name, "all in-flight requests drained"),
        Ok(Err(e)) => error!(server = name, error = %e, "server error during shutdown"),
        Err(e) => error!(server = name, error = %e, "server task panicked"),
    }
}

/// Liveness plus the in-process counters.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// `GET /vouchsafe/request`
async fn request_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    endpoint::start_verification(&state.endpoint, params, request_id).await
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
