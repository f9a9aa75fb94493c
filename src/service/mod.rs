//! Service orchestration
//!
//! Wires configuration into the shared components, exposes the HTTP
//! surface (chat channel plus health and metrics endpoints), and runs
//! the background maintenance tasks.

pub mod app;
pub mod health;
pub mod ws;

pub use app::AppState;

use axum::routing::{any, get};
use axum::Router;
use std::sync::Arc;

/// Full HTTP surface: the chat channel and the observability endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(health::metrics_handler))
        .route("/stats", get(health::stats_handler))
        .route("/ws/chat/{device_id}", any(ws::ws_chat_handler))
        .with_state(state)
}
