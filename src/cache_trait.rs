//! The cache contract
//!
//! A minimal polymorphic surface implemented by every cache variant in this
//! crate (the disabled no-op cache, the two-tier [`crate::generic_cache::GenericCache`],
//! and the AI specialization). Operations never fail on an ordinary miss;
//! they return an explicit absent marker. `CacheUnavailable` is reserved for
//! construction-time failures when a remote backend was required and is
//! unreachable — it is never returned from a data-path call.

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::CacheResult;

/// Tri-state health result from [`Cache::ping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHealth {
    /// All configured tiers are reachable.
    Healthy,
    /// Serving from L1 only; the remote tier is unreachable or disabled.
    Degraded,
    /// No tier can serve requests.
    Unavailable,
}

/// The contract every cache variant implements. Operates on already-encoded
/// bytes; the AI specialization layers value (de)serialization on top.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remove every entry within this cache's namespace (see `NAMESPACE`).
    async fn clear(&self) -> CacheResult<()>;

    /// Non-destructive probe used by health checks.
    async fn ping(&self) -> CacheHealth;
}

/// Every key produced anywhere in this crate lives under this namespace.
/// `clear()` and pattern invalidation must never reach outside it.
pub const NAMESPACE: &str = "ai_cache:";
