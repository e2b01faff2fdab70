//! HTTP API.

pub mod hotspots;
pub mod request_id;
pub mod risk;
mod routes;

use crate::config::Config;
use axum::Router;

pub fn routes(config: &Config) -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router(config)
}
