//! Router assembly.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::{hotspots, request_id, risk};
use crate::config::Config;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    tracing::debug!(
        typenames = ?config.default_typenames,
        default_line = %config.default_line_id,
        "building API routes"
    );

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/firms/wfs", get(hotspots::get_hotspots))
        .route("/v1/firms/risk", post(risk::post_risk))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::ensure_request_id))
}
