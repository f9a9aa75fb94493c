//! Health, metrics and stats endpoints

use crate::service::app::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Service information.
pub async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "instance": state.instance_id(),
        "endpoints": ["/health", "/metrics", "/stats", "/ws/chat/{device_id}"]
    }))
}

/// Lightweight liveness check.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    if state.is_running().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": state.config().service.name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": state.config().service.name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
    }
}

/// Prometheus metrics in text exposition format.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Metrics endpoint requested");

    let metric_families = state.metrics.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", encoder.format_type())
            .body(output.into())
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Queue and session statistics for debugging.
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let queue_stats = match state.store.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Failed to read queue stats: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Failed to read queue stats"})),
            );
        }
    };
    let connections = state.registry.connection_count().unwrap_or(0);
    let active_chats = state.registry.active_pair_count().unwrap_or(0);

    (
        StatusCode::OK,
        Json(json!({
            "service": {
                "name": state.config().service.name,
                "version": env!("CARGO_PKG_VERSION"),
                "instance": state.instance_id(),
            },
            "connections": {
                "active": connections,
                "active_chats": active_chats,
            },
            "queue": {
                "male": queue_stats.male,
                "female": queue_stats.female,
                "other": queue_stats.other,
                "total": queue_stats.total(),
            },
            "timestamp": chrono::Utc::now()
        })),
    )
}
