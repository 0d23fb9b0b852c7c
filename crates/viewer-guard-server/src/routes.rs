//! Route configuration for the blocklist API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{block, check, health_check, list, stats, unblock_by_address, unblock_by_id};
use crate::state::AppState;

/// Create the API router, mounted under the configured prefix.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.config());
    let prefix = state.config().api_prefix.clone();

    let api_routes = Router::new()
        .route("/", get(list))
        .route("/block", post(block))
        .route("/unblock", post(unblock_by_address))
        .route("/unblock/{id}", post(unblock_by_id))
        .route("/check", post(check))
        .route("/stats", get(stats))
        .route("/health", get(health_check));

    // `GET {prefix}/` lists too; nesting alone only serves the bare prefix.
    Router::new()
        .route(&format!("{prefix}/"), get(list))
        .nest(&prefix, api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
