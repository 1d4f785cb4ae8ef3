//! Concurrency-safe registry of per-client token buckets.
//!
//! # Locking
//!
//! ```text
//! limiter_for(key)
//!    │
//!    ├─ read lock ── hit ──────────────────────────────► Arc<TokenBucket>
//!    │
//!    └─ miss ─ write lock ─ re-check ─ hit ────────────► Arc<TokenBucket>
//!                              │
//!                              └─ miss ─ make room ─ insert ─► Arc<TokenBucket>
//! ```
//!
//! Lookups for known clients only take the shared lock. The exclusive lock
//! is taken on the insert path, and the re-check under it guarantees that two
//! racing first requests for the same key end up with the same bucket.
//!
//! # Bounds
//!
//! The map is capped at `max_clients`. When an insert finds the map full it
//! first drops entries idle for longer than `idle_ttl`, then evicts the least
//! recently used entry if the map is still full. [`LimiterRegistry::sweep_idle`]
//! performs the idle pass on its own and is run periodically by the
//! application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{RateLimitError, RateQuota, TokenBucket};

/// Size and idle limits for a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryBounds {
    /// Maximum number of clients tracked at once.
    pub max_clients: usize,
    /// Entries unused for longer than this are eligible for removal.
    pub idle_ttl: Duration,
}

impl Default for RegistryBounds {
    fn default() -> Self {
        Self {
            max_clients: 10_000,
            idle_ttl: Duration::from_secs(600),
        }
    }
}

/// Map from client key to its token bucket.
#[derive(Debug)]
pub struct LimiterRegistry {
    name: &'static str,
    quota: RateQuota,
    bounds: RegistryBounds,
    entries: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    ///
    /// `name` identifies the route group in logs and metrics.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroCapacity` if `bounds.max_clients` is 0.
    pub fn new(
        name: &'static str,
        quota: RateQuota,
        bounds: RegistryBounds,
    ) -> Result<Self, RateLimitError> {
        if bounds.max_clients == 0 {
            return Err(RateLimitError::ZeroCapacity);
        }
        Ok(Self {
            name,
            quota,
            bounds,
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Route group name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Quota applied to every bucket.
    pub fn quota(&self) -> RateQuota {
        self.quota
    }

    /// Return the bucket for `key`, creating it on first sight.
    pub async fn limiter_for(&self, key: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self.entries.read().await.get(key) {
            return Arc::clone(bucket);
        }

        let mut entries = self.entries.write().await;
        // Another request may have inserted while we waited for the write lock
        if let Some(bucket) = entries.get(key) {
            return Arc::clone(bucket);
        }

        if entries.len() >= self.bounds.max_clients {
            self.make_room(&mut entries, Instant::now());
        }

        let bucket = Arc::new(TokenBucket::new(self.quota));
        entries.insert(key.to_string(), Arc::clone(&bucket));
        trace!(registry = self.name, key, clients = entries.len(), "New rate limiter client");
        bucket
    }

    /// Remove entries idle for longer than the configured TTL.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now()).await
    }

    /// Remove entries idle for longer than the configured TTL as of `now`.
    pub async fn sweep_idle_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let removed = remove_idle(&mut entries, now, self.bounds.idle_ttl);
        if removed > 0 {
            debug!(
                registry = self.name,
                removed,
                remaining = entries.len(),
                "Swept idle rate limiter clients"
            );
        }
        removed
    }

    /// Number of clients currently tracked.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no clients are tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn make_room(&self, entries: &mut HashMap<String, Arc<TokenBucket>>, now: Instant) {
        let removed = remove_idle(entries, now, self.bounds.idle_ttl);
        if entries.len() < self.bounds.max_clients {
            debug!(registry = self.name, removed, "Made room by dropping idle clients");
            return;
        }

        let oldest = entries
            .iter()
            .min_by_key(|(_, bucket)| bucket.last_used())
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            entries.remove(&key);
            debug!(registry = self.name, evicted = %key, "Evicted least recently used client");
        }
    }
}

fn remove_idle(
    entries: &mut HashMap<String, Arc<TokenBucket>>,
    now: Instant,
    idle_ttl: Duration,
) -> usize {
    let before = entries.len();
    entries.retain(|_, bucket| bucket.idle_for(now) <= idle_ttl);
    before - entries.len()
}
