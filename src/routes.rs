//! Application routing with one admission pipeline per route group.
//!
//! # Pipeline (stages run top to bottom)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Recovery     │ ← 500 if anything below panics
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Origin Gate    │ ← CORS headers, 204 for preflight
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Access Log    │ ← X-Request-Id, one record per request
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Metrics Capture  │ ← request counter and latency histogram
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Rate Limit Gate  │ ← 429 if exceeded (generation and api groups)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Validator     │ ← 400 if invalid (where the group has one)
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! | Group | Routes | Extra stages |
//! |-------|--------|--------------|
//! | ops | `/health`, `/ready`, `/metrics`, fallback | none |
//! | generation | `POST /generate_recipe` | strict limit, request body validator |
//! | api | `POST /save_recipe`, `/export_recipe/{format}`, `/validate_ingredients` | loose limit |
//! | api-list | `GET /api/recipes` | loose limit, pagination validator |
//! | api-item | `/api/recipes/{id}`, `/api/recipes/{id}/rating` | loose limit, id validator |
//!
//! The api groups share one loose registry; the generation registry is
//! separate. Gates only run for a matched route and method; an unsupported
//! method gets 405 `{"error":"Method not allowed"}` without spending a permit.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tracing::info;

use crate::error::AppError;
use crate::handlers;
use crate::middleware::{
    AccessLogLayer, MetricsLayer, OriginLayer, Pipeline, RateLimitGate, Stage, Validator,
};
use crate::state::AppState;

/// Build the application router with every route group and its pipeline.
///
/// # Arguments
///
/// * `state` - Application state holding the registries, metrics and collaborators
///
/// # Returns
///
/// Fully configured Axum router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so client keys come
/// from the peer address.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // Shared Stages
    // =========================================================================
    let base = Pipeline::new([
        Stage::OriginGate(OriginLayer::new(&config.allowed_origins)),
        Stage::AccessLog(AccessLogLayer::new(state.trusted_proxies.clone())),
        Stage::MetricsCapture(MetricsLayer::new(state.metrics.clone())),
    ]);

    let strict = Stage::RateLimitGate(RateLimitGate::new(
        state.generation_limits.clone(),
        state.trusted_proxies.clone(),
    ));
    let loose = Stage::RateLimitGate(RateLimitGate::new(
        state.api_limits.clone(),
        state.trusted_proxies.clone(),
    ));

    info!(
        generation_per_minute = config.generate_rate_per_minute,
        generation_burst = config.generate_rate_burst,
        api_per_minute = config.api_rate_per_minute,
        api_burst = config.api_rate_burst,
        trusted_proxies = config.trusted_proxies.len(),
        allowed_origins = ?config.allowed_origins,
        "Rate limiting configured"
    );

    // =========================================================================
    // Route Groups
    // =========================================================================
    let ops = base.apply(
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(not_found),
    );

    let generation = base
        .clone()
        .then([
            strict,
            Stage::Validator(Validator::RecipeRequest {
                body_limit: config.max_request_body_size,
            }),
        ])
        .apply(
            Router::new()
                .route("/generate_recipe", post(handlers::generate_recipe))
                .method_not_allowed_fallback(method_not_allowed),
        );

    let api = base.clone().then([loose.clone()]).apply(
        Router::new()
            .route("/save_recipe", post(handlers::save_recipe))
            .route("/export_recipe/{format}", post(handlers::export_recipe))
            .route("/validate_ingredients", post(handlers::validate_ingredients))
            .method_not_allowed_fallback(method_not_allowed),
    );

    let api_list = base
        .clone()
        .then([loose.clone(), Stage::Validator(Validator::Pagination)])
        .apply(
            Router::new()
                .route("/api/recipes", get(handlers::list_recipes))
                .method_not_allowed_fallback(method_not_allowed),
        );

    let api_item = base
        .then([loose, Stage::Validator(Validator::RecipeId)])
        .apply(
            Router::new()
                .route(
                    "/api/recipes/{id}",
                    get(handlers::get_recipe).delete(handlers::delete_recipe),
                )
                .route("/api/recipes/{id}/rating", put(handlers::update_rating))
                .method_not_allowed_fallback(method_not_allowed),
        );

    // Request body size limit (prevents DoS via large payloads)
    info!(
        max_size_kb = config.max_request_body_size / 1024,
        "Request body size limit configured"
    );
    let body_limit = DefaultBodyLimit::max(config.max_request_body_size);

    Router::new()
        .merge(ops)
        .merge(generation)
        .merge(api)
        .merge(api_list)
        .merge(api_item)
        .layer(body_limit)
        .with_state(state)
}

/// Fallback for a known path with an unsupported method.
async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Fallback for unmatched paths.
async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
