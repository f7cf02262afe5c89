//! Server initialization and routing
//!
//! This module handles the native HTTP API setup:
//! - Router configuration for the recipe endpoints
//! - Middleware stack (request id, tracer, auth, content type)
//! - Process entry point with signal handling

use crate::config::ServerConfig;
use crate::hybrid::HybridServer;
use crate::middleware::{api_key_auth, json_content_type, request_id, trace_requests};
use crate::routes::{not_found, recipes};
use crate::state::ServerState;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Build the native HTTP router
///
/// Every route, the 404 fallback included, sits behind API key auth.
///
/// Middleware stack (outermost first):
/// 1. tower-http trace
/// 2. Request ID tracking
/// 3. Call tracer
/// 4. API key authentication
/// 5. Content type normalization
/// 6. Timeout handling
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/recipe", post(recipes::add_recipe))
        .route("/recipe/{name}", get(recipes::get_recipe))
        .route("/recipes", get(recipes::find_recipes))
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(from_fn(json_content_type))
        .layer(from_fn_with_state(state.clone(), api_key_auth))
        .layer(from_fn(trace_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Install the JSON log subscriber. `RUST_LOG` overrides the configured level.
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing(config: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();
}

/// Start the recipe server
///
/// Builds the configured storage backend, starts the listeners the mode
/// asks for and blocks until SIGTERM or Ctrl+C (or until every listener has
/// exited), after which every listener is stopped and joined.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config);

    tracing::info!(
        backend = config.database.kind(),
        timeout_secs = config.timeout_secs,
        shutdown_grace_secs = config.shutdown_grace_secs,
        grpc_drain_secs = config.grpc_drain_secs,
        "Starting recipe server"
    );

    let store = config.database.build().await?;
    let mut server = HybridServer::start(&config, store).await?;

    // A listener that dies is logged as it happens; the others keep serving
    // until the signal arrives.
    let mut failures = Vec::new();
    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            _ = &mut signal => break,
            exit = server.next_exit() => match exit {
                Some((name, Err(e))) => failures.push(format!("{name}: {e:#}")),
                Some((_, Ok(()))) => {}
                None => break,
            },
        }
    }

    server.stop();
    while let Some((name, result)) = server.next_exit().await {
        if let Err(e) = result {
            failures.push(format!("{name}: {e:#}"));
        }
    }
    if !failures.is_empty() {
        anyhow::bail!("listeners failed: {}", failures.join("; "));
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
