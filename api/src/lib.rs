//! HTTP surface of the guide: `POST /api/chat` and `GET /api/health`.

pub mod core;
pub mod error_handler;
pub mod middleware_layer;
mod routes;

use std::{env, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, warn};

pub use crate::core::app_state::AppState;
pub use crate::error_handler::{AppError, AppResult};

use crate::middleware_layer::request_id::{REQUEST_ID_HEADER, ensure_request_id};
use crate::routes::{chat::chat_route::chat, health_route::health};

pub const DEFAULT_API_ADDRESS: &str = "127.0.0.1:5000";

/// Builds the application router with CORS, tracing and request ids.
pub fn router(state: Arc<AppState>) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %request_id)
    });

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(trace)
        .layer(middleware::from_fn(ensure_request_id))
        .layer(CorsLayer::permissive())
}

/// Reads configuration from the environment and serves until Ctrl+C.
pub async fn start() -> AppResult<()> {
    let address = env::var("API_ADDRESS").unwrap_or_else(|_| DEFAULT_API_ADDRESS.to_string());
    let state = Arc::new(AppState::from_env().await?);

    #[cfg(unix)]
    reload_on_hangup(Arc::clone(&state));

    let listener = TcpListener::bind(&address).await.map_err(AppError::Bind)?;
    info!(%address, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("server stopped");
    Ok(())
}

/// Re-reads the knowledge base artifacts on every SIGHUP.
///
/// A failed reload keeps the previous snapshot in service.
#[cfg(unix)]
fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler not installed; knowledge base reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match state.pipeline.reload_knowledge_base().await {
                Ok(()) => info!("knowledge base reloaded on SIGHUP"),
                Err(e) => warn!(error = %e, "knowledge base reload failed; previous snapshot kept"),
            }
        }
    });
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
