//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use super::sse::stream_handler;
use crate::config::LensConfig;
use crate::stream::StreamHub;

/// Shared state for HTTP handlers
pub struct ApiState {
    pub hub: StreamHub,
    /// Frame buffer per stream connection
    pub client_buffer: usize,
}

impl ApiState {
    pub fn new(hub: StreamHub, config: &LensConfig) -> Self {
        Self {
            hub,
            client_buffer: config.client_buffer,
        }
    }
}

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<ApiState>) -> Router {
    // CORS configuration - dashboards may be served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/stream", get(stream_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
