//! Per-client rate limiting gate.
//!
//! # Algorithm
//!
//! Each client key owns a token bucket in the route group's
//! [`LimiterRegistry`]. A request spends one permit; permits refill
//! continuously at the configured per-minute rate up to the burst size.
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `Retry-After`: Seconds until the next permit accrues (at least 1)
//! - `X-RateLimit-Limit`: Configured requests per minute
//!
//! # Client Key
//!
//! The key is resolved once per request by the access log stage and stored in
//! the [`PipelineContext`]; this gate only computes it itself when running
//! without that stage. See [`super::ip`] for the trusted proxy rules.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use tracing::warn;

use super::context::PipelineContext;
use super::ip::{TrustedProxyConfig, client_key};
use super::stage::{Flow, Gate};
use crate::error::AppError;
use crate::limiter::LimiterRegistry;

/// Stage name reported on 429 responses.
pub const RATE_LIMIT_STAGE: &str = "rate_limit";

/// Gate charging each request to its client's token bucket.
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    registry: Arc<LimiterRegistry>,
    trusted_proxies: Arc<TrustedProxyConfig>,
    /// Requests per minute, for the `X-RateLimit-Limit` header
    limit: u32,
}

impl RateLimitGate {
    /// Create a gate over a registry.
    pub fn new(registry: Arc<LimiterRegistry>, trusted_proxies: Arc<TrustedProxyConfig>) -> Self {
        let limit = registry.quota().per_minute_limit();
        Self {
            registry,
            trusted_proxies,
            limit,
        }
    }

    /// Registry this gate charges.
    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }
}

impl Gate for RateLimitGate {
    fn name(&self) -> &'static str {
        RATE_LIMIT_STAGE
    }

    async fn check(&self, mut req: Request<Body>) -> Flow {
        let resolved = PipelineContext::of(req.extensions_mut()).client_key.clone();
        let key = match resolved {
            Some(key) => key,
            None => {
                let key = client_key(&req, &self.trusted_proxies).into_owned();
                PipelineContext::of(req.extensions_mut()).client_key = Some(key.clone());
                key
            }
        };

        let bucket = self.registry.limiter_for(&key).await;
        match bucket.check() {
            Ok(()) => Flow::Continue(req),
            Err(retry_after) => {
                warn!(
                    client_ip = %key,
                    registry = self.registry.name(),
                    path = %req.uri().path(),
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "Rate limit exceeded for client"
                );
                Flow::reject(AppError::RateLimited {
                    retry_after,
                    limit: self.limit,
                })
            }
        }
    }
}
