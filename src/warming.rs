//! Cache warming
//!
//! A minimal warmer that re-`get`s a batch of keys so an L2 hit gets
//! promoted into L1 ahead of real traffic. Kept intentionally small: no
//! scheduler, no background task — callers decide when to invoke it.

use serde::{Deserialize, Serialize};

use crate::cache_trait::Cache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmingStrategy {
    /// Warm immediately, blocking the caller until the batch completes.
    Eager,
    /// Warm opportunistically; callers may fire-and-forget this variant.
    Lazy,
    /// Warm on an external trigger (e.g. a cron-style caller); this crate
    /// does not run a scheduler itself.
    Scheduled,
}

/// Result of a single warming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmingReport {
    pub attempted: u64,
    pub warmed: u64,
}

pub struct CacheWarmer {
    strategy: WarmingStrategy,
}

impl CacheWarmer {
    pub fn new(strategy: WarmingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> WarmingStrategy {
        self.strategy
    }

    /// Re-`get` every key in `keys` against `cache`, promoting any L2 hit
    /// into L1. Misses are not an error; they simply don't count as warmed.
    pub async fn warm_keys(&self, cache: &dyn Cache, keys: &[String]) -> WarmingReport {
        let mut report = WarmingReport {
            attempted: keys.len() as u64,
            ..Default::default()
        };

        for key in keys {
            match cache.get(key).await {
                Ok(Some(_)) => report.warmed += 1,
                Ok(None) => {}
                Err(e) => tracing::warn!(key, error = %e, "warming pass failed to read key"),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::generic_cache::GenericCache;
    use crate::monitor::PerformanceMonitor;
    use std::sync::Arc;

    #[tokio::test]
    async fn warming_counts_only_keys_that_were_present() {
        let cache = GenericCache::new(&CacheConfig::default(), None, Arc::new(PerformanceMonitor::new(Default::default())));
        cache.set("present", b"v".to_vec(), None).await.unwrap();

        let warmer = CacheWarmer::new(WarmingStrategy::Eager);
        let report = warmer
            .warm_keys(&cache, &["present".to_string(), "absent".to_string()])
            .await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.warmed, 1);
    }
}
