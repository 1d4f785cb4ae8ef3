//! Single-key token bucket.
//!
//! # Algorithm
//!
//! Permits accrue continuously at `rate` per second up to `burst`. Every
//! admission spends exactly one permit. The count is fractional so that a
//! slow rate (e.g. 5 per minute) still accrues partial permits between calls.
//!
//! ```text
//! tokens = min(burst, tokens + elapsed * rate)
//! if tokens >= 1.0 { tokens -= 1.0; admit } else { deny }
//! ```
//!
//! The refill and the compare-and-decrement happen under one mutex scoped to
//! this bucket, so concurrent requests for the same client see a serializable
//! sequence of admissions while different clients never contend.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::RateQuota;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter for one logical client.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(quota: RateQuota) -> Self {
        Self::new_at(quota, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    pub fn new_at(quota: RateQuota, now: Instant) -> Self {
        let burst = f64::from(quota.burst());
        Self {
            rate: quota.per_second_rate(),
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: now,
            }),
        }
    }

    /// Try to spend one permit now.
    pub fn try_admit(&self) -> bool {
        self.check_at(Instant::now()).is_ok()
    }

    /// Try to spend one permit at `now`.
    pub fn try_admit_at(&self, now: Instant) -> bool {
        self.check_at(now).is_ok()
    }

    /// Try to spend one permit now, returning the wait until the next
    /// permit on denial.
    pub fn check(&self) -> Result<(), Duration> {
        self.check_at(Instant::now())
    }

    /// Refill up to `now`, then admit or deny.
    ///
    /// A `now` earlier than the last refill adds nothing; the bucket never
    /// runs its clock backwards.
    pub fn check_at(&self, now: Instant) -> Result<(), Duration> {
        // The state is two plain numbers; a panic elsewhere cannot leave it torn.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        if now > state.last_refill {
            state.last_refill = now;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.rate))
        }
    }

    /// Permits currently available as of the last refill.
    pub fn available(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }

    /// How long this bucket has gone without a call, measured at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(state.last_refill)
    }

    /// Timestamp of the most recent call.
    pub(crate) fn last_used(&self) -> Instant {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_refill
    }
}
