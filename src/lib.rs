//! # Recipe Gateway
//!
//! HTTP service that turns ingredient lists into recipes through an external
//! text-generation API and keeps the ones users save. Every request passes a
//! request-admission pipeline before reaching a handler:
//!
//! - **Containment**: Handler panics become 500 responses, never crashes
//! - **Origin Control**: CORS allow-list with preflight short-circuit
//! - **Rate Limiting**: Lazily populated, bounded per-client token buckets
//! - **Validation**: Request bodies and route parameters checked up front
//! - **Observability**: Request IDs, structured access logs, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Recovery → Origin → AccessLog → Metrics →        │
//! │            RateLimit → Validator), one per route group      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, generate, recipes)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (RecipeGenerator, RecipeStore)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Anthropic Messages API / in-memory store                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use recipe_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!
//!     state.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Rate Limiting
//!
//! ```bash
//! GENERATE_RATE_PER_MINUTE=5 GENERATE_RATE_BURST=2 API_RATE_PER_MINUTE=100 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
