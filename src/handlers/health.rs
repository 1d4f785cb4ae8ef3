//! Health, readiness, and metrics endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness, always 200 while the process serves requests
//! - `GET /ready` - Readiness probe, 503 if the store does not answer
//! - `GET /metrics` - Prometheus text exposition
//!
//! # Health vs Readiness
//!
//! - **Health** (`/health`): Never touches collaborators
//! - **Readiness** (`/ready`): Pings the store on every call

use axum::Json;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::error::{AppError, AppResult};
use crate::models::{HealthResponse, ReadyResponse};
use crate::state::AppState;

/// Content type of the Prometheus text format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint.
///
/// Returns 200 with `{"status":"ready","database":"connected"}` if the store
/// answers a ping, 503 Service Unavailable otherwise.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> AppResult<Json<ReadyResponse>> {
    if let Err(e) = state.store.ping().await {
        warn!(error = %e, "Readiness check failed");
        return Err(AppError::NotReady(e.to_string()));
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        database: "connected",
        timestamp: Utc::now(),
    }))
}

/// Prometheus scrape endpoint.
///
/// Refreshes the saved recipe gauge before rendering.
#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.refresh_recipe_gauge().await;
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.render())
}
