//! Shared application state for Axum handlers.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all request handlers and pipeline stages. It includes:
//!
//! - **Collaborators**: Recipe generator and recipe store, behind traits
//! - **Limiter Registries**: One per rate-limited route group
//! - **Metrics**: The application's private Prometheus recorder
//! - **Configuration**: Runtime configuration access
//!
//! # Structured Concurrency
//!
//! The idle sweep of the limiter registries runs as a background task managed
//! with `tokio_util::task::TaskTracker` and `CancellationToken`. Call
//! `shutdown()` to stop it before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::limiter::LimiterRegistry;
use crate::metrics::Metrics;
use crate::middleware::TrustedProxyConfig;
use crate::services::{AnthropicGenerator, InMemoryRecipeStore, RecipeGenerator, RecipeStore};

/// Name of the strict registry guarding recipe generation.
pub const GENERATION_GROUP: &str = "generation";

/// Name of the loose registry shared by the recipe API routes.
pub const API_GROUP: &str = "api";

/// Shared application state for Axum handlers.
///
/// This struct is cloned for each request handler. All internal data
/// is wrapped in `Arc` for efficient sharing.
///
/// # Lifecycle
///
/// The registry sweep task is spawned when the state is created, so this
/// must be constructed inside a Tokio runtime. Call `shutdown()` before
/// dropping to ensure clean task termination:
///
/// ```rust,ignore
/// let state = AppState::new(config)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Text-generation collaborator
    pub generator: Arc<dyn RecipeGenerator>,
    /// Recipe persistence
    pub store: Arc<dyn RecipeStore>,
    /// Metrics recorder and exposition handle
    pub metrics: Metrics,
    /// Strict per-client limits for `POST /generate_recipe`
    pub generation_limits: Arc<LimiterRegistry>,
    /// Loose per-client limits shared by every API route
    pub api_limits: Arc<LimiterRegistry>,
    /// Networks whose forwarding headers are believed
    pub trusted_proxies: Arc<TrustedProxyConfig>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create state with the production collaborators: the Anthropic
    /// generation client and the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a collaborator or registry cannot be
    /// built from `config`.
    pub fn new(config: Config) -> AppResult<Self> {
        let generator = AnthropicGenerator::new(config.anthropic_settings())
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Self::with_collaborators(
            config,
            Arc::new(generator),
            Arc::new(InMemoryRecipeStore::new()),
        )
    }

    /// Create state around the given generator and store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for a zero rate or registry capacity,
    /// or if the metrics recorder cannot be built.
    pub fn with_collaborators(
        config: Config,
        generator: Arc<dyn RecipeGenerator>,
        store: Arc<dyn RecipeStore>,
    ) -> AppResult<Self> {
        let bounds = config.registry_bounds();
        let generation_limits = LimiterRegistry::new(
            GENERATION_GROUP,
            config.generation_quota().map_err(config_error)?,
            bounds,
        )
        .map_err(config_error)?;
        let api_limits =
            LimiterRegistry::new(API_GROUP, config.api_quota().map_err(config_error)?, bounds)
                .map_err(config_error)?;

        let metrics = Metrics::new().map_err(config_error)?;
        let trusted_proxies = TrustedProxyConfig::new(&config.trusted_proxies);

        let state = Self {
            config: Arc::new(config),
            generator,
            store,
            metrics,
            generation_limits: Arc::new(generation_limits),
            api_limits: Arc::new(api_limits),
            trusted_proxies: Arc::new(trusted_proxies),
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_registry_sweep_task();

        Ok(state)
    }

    /// Refresh the saved recipe gauge from the store.
    ///
    /// Failures are logged and leave the previous value in place.
    pub async fn refresh_recipe_gauge(&self) {
        match self.store.count().await {
            Ok(count) => self.metrics.set_total_recipes(count),
            Err(e) => warn!(error = %e, "Failed to count recipes for metrics"),
        }
    }

    /// Spawn the background registry sweep.
    ///
    /// Each tick drops idle buckets from both registries, publishes the
    /// remaining client counts and runs recorder upkeep.
    fn spawn_registry_sweep_task(&self) {
        let registries = [self.generation_limits.clone(), self.api_limits.clone()];
        let metrics = self.metrics.clone();
        let period = self.config.rate_limit_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Registry sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        for registry in &registries {
                            registry.sweep_idle().await;
                            metrics.set_rate_limiter_clients(registry.name(), registry.len().await);
                        }
                        metrics.run_upkeep();
                    }
                }
            }

            debug!("Registry sweep task shutting down");
        });
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// This method:
    /// 1. Signals all tasks to stop via cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!(
            uptime_secs = self.uptime_seconds(),
            "Initiating graceful shutdown of background tasks"
        );

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

fn config_error(e: impl std::fmt::Display) -> AppError {
    AppError::ConfigError(e.to_string())
}
