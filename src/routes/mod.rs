//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/conversions` - Submit a PDF, list past conversions
//! - `/api/conversions/{id}` - Fetch one conversion with its markup
//! - `/api/progress/ws` - WebSocket stream of the caller's progress events

pub mod conversions;
pub mod health;
pub mod progress;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

// Headroom for multipart framing on top of the document itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state.config.server.max_upload_bytes + MULTIPART_OVERHEAD;
    let cors = cors_layer(&state.config.server);

    Router::new()
        .merge(conversions::router(state.clone()))
        .merge(progress::router(state.clone()))
        .merge(health::router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
