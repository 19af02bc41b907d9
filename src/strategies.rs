//! Strategy labels
//!
//! A coarse-grained performance/reliability label attached to each preset
//! (§6 "Strategy labels"). Purely descriptive — it never gates behavior
//! directly; it documents the tradeoff a preset's concrete settings encode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Short TTLs, aggressive L1, low compression overhead. Optimizes for
    /// latency over remote-store footprint.
    Fast,
    /// Moderate TTLs and compression; the default tradeoff for general use.
    Balanced,
    /// Longer TTLs, stronger compression, `fail_on_connection_error` often
    /// left off so degraded operation is preferred over an outage.
    Robust,
    /// Tuned for AI workloads: per-operation TTL table populated, text-size
    /// tiers enabled, hashing favored over literal embedding.
    AiOptimized,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fast => "fast",
            Strategy::Balanced => "balanced",
            Strategy::Robust => "robust",
            Strategy::AiOptimized => "ai_optimized",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_the_enumerated_spec_labels() {
        assert_eq!(Strategy::Fast.to_string(), "fast");
        assert_eq!(Strategy::Balanced.to_string(), "balanced");
        assert_eq!(Strategy::Robust.to_string(), "robust");
        assert_eq!(Strategy::AiOptimized.to_string(), "ai_optimized");
    }
}
