pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod listen;
pub mod mail;
pub mod models;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use gateway::session::Gateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<Gateway>,
}

/// All routes: the WebSocket endpoint plus a liveness probe.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(gateway::server::router())
}

/// The full service with CORS and request tracing applied.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.frontend_url.as_deref());
    router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Restrict CORS to the configured frontend origin, or allow any origin
/// when none is set.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(%e, "FRONTEND_URL is not a valid origin, allowing any");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
