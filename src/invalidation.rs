//! Pattern invalidation (§4.7)
//!
//! Bulk removal of every namespaced key whose remote key matches
//! `ai_cache:*{pattern}*`. Delegates the actual enumeration to
//! [`crate::remote::RemoteClient::scan`], which is cursor-based and
//! budget-bounded for a real store; a `regex` double-check guards against a
//! looser glob match than the caller intended, since not every backend's
//! glob dialect treats special characters the same way.

use std::time::{Duration, Instant};

use regex::Regex;

use crate::cache_trait::NAMESPACE;
use crate::errors::CacheResult;
use crate::monitor::PerformanceMonitor;
use crate::remote::RemoteClient;

/// Result of a pattern invalidation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationOutcome {
    pub keys_removed: u64,
    /// `true` if the scan budget was exhausted before the cursor completed;
    /// the count above is a lower bound in that case.
    pub partial: bool,
}

/// Build a regex matching any namespaced key containing `pattern` as a
/// literal substring, for verifying candidates returned by a glob scan.
pub fn compile_pattern(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern);
    Regex::new(&format!("^{}.*{escaped}.*", regex::escape(NAMESPACE))).expect("constructed pattern is always valid regex")
}

/// Remove every key under the cache namespace that contains `pattern`,
/// recording an invalidation event regardless of outcome.
pub async fn invalidate_pattern(
    remote: &dyn RemoteClient,
    monitor: &PerformanceMonitor,
    pattern: &str,
    reason: &str,
) -> CacheResult<InvalidationOutcome> {
    let start = Instant::now();
    let glob = format!("{NAMESPACE}*{pattern}*");
    let matcher = compile_pattern(pattern);

    let (candidates, exhausted) = remote.scan(&glob).await?;

    let mut removed = 0u64;
    for key in candidates.iter().filter(|k| matcher.is_match(k)) {
        match remote.delete(key).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(key, error = %e, "failed to delete key during pattern invalidation"),
        }
    }

    let outcome = InvalidationOutcome {
        keys_removed: removed,
        partial: !exhausted,
    };

    if outcome.partial {
        tracing::warn!(pattern, removed, "pattern invalidation budget exhausted; result is partial");
    }

    monitor
        .record_invalidation(pattern, outcome.keys_removed, start.elapsed(), reason)
        .await;

    Ok(outcome)
}

/// Shorthand for invalidating every key produced for a single operation.
pub fn pattern_for_operation(operation: &str) -> String {
    format!("op:{operation}")
}
