//! Per-client rate limiting primitives.
//!
//! - [`TokenBucket`]: admit/deny decisions for a single client
//! - [`LimiterRegistry`]: lazily populated, bounded map from client key to bucket
//!
//! One registry exists per rate-limited route group. Registries never share
//! buckets, so the strict generation quota and the looser API quota are
//! tracked independently for the same client.

mod bucket;
mod registry;

use std::fmt;

pub use bucket::TokenBucket;
pub use registry::{LimiterRegistry, RegistryBounds};

/// Error type for rate quota configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Refill rate cannot be zero.
    ZeroRate,
    /// Registry capacity cannot be zero.
    ZeroCapacity,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroRate => write!(f, "rate limit must allow at least 1 request"),
            RateLimitError::ZeroCapacity => {
                write!(f, "rate limiter registry must hold at least 1 client")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Refill rate and burst capacity shared by every bucket in a registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuota {
    per_second: f64,
    burst: u32,
}

impl RateQuota {
    /// Quota of `count` permits per minute.
    ///
    /// A `burst` of 0 is raised to 1 so a fresh client can always make one
    /// request.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRate` if `count` is 0.
    pub fn per_minute(count: u32, burst: u32) -> Result<Self, RateLimitError> {
        if count == 0 {
            return Err(RateLimitError::ZeroRate);
        }
        Ok(Self {
            per_second: f64::from(count) / 60.0,
            burst: burst.max(1),
        })
    }

    /// Quota of `count` permits per second.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRate` if `count` is 0.
    pub fn per_second(count: u32, burst: u32) -> Result<Self, RateLimitError> {
        if count == 0 {
            return Err(RateLimitError::ZeroRate);
        }
        Ok(Self {
            per_second: f64::from(count),
            burst: burst.max(1),
        })
    }

    /// Refill rate in permits per second.
    pub fn per_second_rate(&self) -> f64 {
        self.per_second
    }

    /// Maximum instantaneous allowance.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Sustained rate expressed as whole requests per minute.
    pub fn per_minute_limit(&self) -> u32 {
        // Saturating float-to-int cast
        (self.per_second * 60.0).round() as u32
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_per_minute_converts_to_per_second() {
        let quota = RateQuota::per_minute(120, 10).unwrap();
        assert_eq!(quota.per_second_rate(), 2.0);
        assert_eq!(quota.burst(), 10);
        assert_eq!(quota.per_minute_limit(), 120);
    }

    #[test]
    fn test_per_minute_limit_round_trips_small_rates() {
        assert_eq!(RateQuota::per_minute(5, 2).unwrap().per_minute_limit(), 5);
        assert_eq!(RateQuota::per_second(2, 1).unwrap().per_minute_limit(), 120);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert_eq!(RateQuota::per_minute(0, 2), Err(RateLimitError::ZeroRate));
        assert_eq!(RateQuota::per_second(0, 2), Err(RateLimitError::ZeroRate));
    }

    #[test]
    fn test_zero_burst_raised_to_one() {
        let quota = RateQuota::per_second(1, 0).unwrap();
        assert_eq!(quota.burst(), 1);
    }
}
