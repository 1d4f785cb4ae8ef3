//! Prometheus metrics for application observability.
//!
//! Metrics are exposed on the application's own `GET /metrics` route.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `recipe_ai_http_requests_total` - Completed requests (labels: method, endpoint, status)
//!
//! ## Histograms
//! - `recipe_ai_http_duration_seconds` - Request duration (labels: method, endpoint)
//!
//! ## Gauges
//! - `recipe_ai_total_recipes` - Saved recipes, refreshed on every scrape
//! - `recipe_ai_rate_limiter_clients` - Tracked clients per registry (label: group)
//!
//! # Recorder Scope
//!
//! No global recorder is installed. Each [`Metrics`] owns a
//! `PrometheusRecorder` and records through `metrics::with_local_recorder`,
//! so independent application states (and tests) never share series.
//!
//! ```rust,ignore
//! let metrics = Metrics::new()?;
//! metrics.record_request("GET", "/health", 200, Duration::from_millis(3));
//! let body = metrics.render();
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "recipe_ai_http_requests_total";
    pub const HTTP_DURATION_SECONDS: &str = "recipe_ai_http_duration_seconds";
    pub const TOTAL_RECIPES: &str = "recipe_ai_total_recipes";
    pub const RATE_LIMITER_CLIENTS: &str = "recipe_ai_rate_limiter_clients";
}

/// Histogram buckets for request durations, in seconds.
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Application metrics backed by a private Prometheus recorder.
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Build a recorder and describe every metric.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` if the histogram bucket configuration is rejected.
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(names::HTTP_DURATION_SECONDS.to_string()),
                &DURATION_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        let metrics = Self {
            recorder: Arc::new(recorder),
            handle,
        };
        metrics.describe();
        Ok(metrics)
    }

    fn describe(&self) {
        self.with_recorder(|| {
            describe_counter!(
                names::HTTP_REQUESTS_TOTAL,
                "Total number of HTTP requests"
            );
            describe_histogram!(
                names::HTTP_DURATION_SECONDS,
                metrics::Unit::Seconds,
                "HTTP request duration in seconds"
            );
            describe_gauge!(
                names::TOTAL_RECIPES,
                "Total number of recipes in the store"
            );
            describe_gauge!(
                names::RATE_LIMITER_CLIENTS,
                "Clients currently tracked by a rate limiter registry"
            );
        });
    }

    fn with_recorder<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&*self.recorder, f)
    }

    /// Record one completed HTTP request.
    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.with_recorder(|| {
            counter!(
                names::HTTP_REQUESTS_TOTAL,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string(),
                "status" => status.to_string()
            )
            .increment(1);
            histogram!(
                names::HTTP_DURATION_SECONDS,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string()
            )
            .record(duration.as_secs_f64());
        });
    }

    /// Update the saved recipe gauge.
    pub fn set_total_recipes(&self, count: usize) {
        self.with_recorder(|| {
            // Precision loss above 2^53 recipes is irrelevant for a gauge
            gauge!(names::TOTAL_RECIPES).set(count as f64);
        });
    }

    /// Update the tracked client gauge for a rate limiter registry.
    pub fn set_rate_limiter_clients(&self, group: &'static str, count: usize) {
        self.with_recorder(|| {
            gauge!(names::RATE_LIMITER_CLIENTS, "group" => group).set(count as f64);
        });
    }

    /// Render all series in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Housekeeping for histogram storage; call periodically.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}
