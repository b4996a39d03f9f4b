//! Runtime configuration for the segment cache.
//!
//! There is no GUC registry here — this is a plain, serde-round-trippable
//! struct the embedding application builds once and hands to the
//! `CacheManager` at startup.

use serde::{Deserialize, Serialize};

/// Per-operation timeout budgets and tuning knobs for the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Provider class/module name override. `None` means the runtime
    /// picks whatever single provider implementation is registered.
    pub segment_cache_impl: Option<String>,

    pub read_timeout_ms: u64,
    pub lookup_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub scan_timeout_ms: u64,

    /// Sparse-vs-dense decision in rollup: a target is stored densely
    /// when the fraction of filled cells is at least this threshold.
    pub rollup_density_threshold: f64,

    /// Upper bound on in-memory index size. `None` means unbounded.
    pub max_index_headers: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            segment_cache_impl: None,
            read_timeout_ms: 5_000,
            lookup_timeout_ms: 2_000,
            write_timeout_ms: 10_000,
            scan_timeout_ms: 30_000,
            rollup_density_threshold: 0.5,
            max_index_headers: None,
        }
    }
}

impl CacheConfig {
    /// Validates ranges that `serde` alone can't enforce: a threshold
    /// outside `[0, 1]` or a zero timeout would silently break the
    /// manager's scheduling assumptions.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.rollup_density_threshold) {
            return Err(format!(
                "rollup_density_threshold must be in [0, 1], got {}",
                self.rollup_density_threshold
            ));
        }
        for (name, ms) in [
            ("read_timeout_ms", self.read_timeout_ms),
            ("lookup_timeout_ms", self.lookup_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
            ("scan_timeout_ms", self.scan_timeout_ms),
        ] {
            if ms == 0 {
                return Err(format!("{name} must be non-zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_density_threshold_is_rejected() {
        let mut cfg = CacheConfig::default();
        cfg.rollup_density_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = CacheConfig::default();
        cfg.write_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
