//! Per-route-group stage composition.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Applying it to a router
//! wraps every route (and the fallback) so the first stage listed is the
//! outermost one and sees the request first:
//!
//! ```text
//! Recovery → OriginGate → AccessLog → MetricsCapture → RateLimitGate → Validator → handler
//! ```
//!
//! Order is fixed when the pipeline is built; no stage is skipped or
//! reordered based on request content. Recovery always ends up outermost.
//!
//! Wrapping stages also cover the fallback and the 405 answer for an
//! unsupported method. Gates (rate limit, validator) run only for a matched
//! route and method, so a request that can never reach a handler does not
//! spend a permit.

use std::fmt;

use axum::Router;

use super::access_log::AccessLogLayer;
use super::cors::{ORIGIN_STAGE, OriginLayer};
use super::metrics::MetricsLayer;
use super::rate_limit::RateLimitGate;
use super::recovery::{RECOVERY_STAGE, RecoveryLayer};
use super::stage::{Gate, GateLayer};
use super::validate::Validator;

/// One pipeline stage.
#[derive(Clone)]
pub enum Stage {
    Recovery,
    OriginGate(OriginLayer),
    AccessLog(AccessLogLayer),
    MetricsCapture(MetricsLayer),
    RateLimitGate(RateLimitGate),
    Validator(Validator),
}

impl Stage {
    /// Stage name, as reported in access log records.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Recovery => RECOVERY_STAGE,
            Stage::OriginGate(_) => ORIGIN_STAGE,
            Stage::AccessLog(_) => "access_log",
            Stage::MetricsCapture(_) => "metrics",
            Stage::RateLimitGate(gate) => gate.name(),
            Stage::Validator(validator) => validator.name(),
        }
    }

    fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Stage::Recovery => router.layer(RecoveryLayer::new()),
            Stage::OriginGate(layer) => router.layer(layer),
            Stage::AccessLog(layer) => router.layer(layer),
            Stage::MetricsCapture(layer) => router.layer(layer),
            Stage::RateLimitGate(gate) => router.route_layer(GateLayer::new(gate)),
            Stage::Validator(validator) => router.route_layer(GateLayer::new(validator)),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered stage list for one route group.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a pipeline from stages in request order.
    ///
    /// A single Recovery stage is placed first whether or not it was listed.
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Self {
        let mut ordered = vec![Stage::Recovery];
        ordered.extend(
            stages
                .into_iter()
                .filter(|stage| !matches!(stage, Stage::Recovery)),
        );
        Self { stages: ordered }
    }

    /// This pipeline followed by more stages.
    pub fn then(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(
            stages
                .into_iter()
                .filter(|stage| !matches!(stage, Stage::Recovery)),
        );
        self
    }

    /// Stage names in request order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Wrap every route of `router` in this pipeline.
    ///
    /// Gates attach with `route_layer`, so `router` must already hold its
    /// routes when the pipeline has a gate.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // The last layer added is the outermost
        self.stages
            .iter()
            .rev()
            .cloned()
            .fold(router, |router, stage| stage.apply(router))
    }
}
