use std::time::Duration;

use serde::Deserialize;

/// Storage and query settings, the `[store]` table of the server config.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Lifetime of base-table items.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Lifetime of delta-log entries. Bounds how far back `sync` can look.
    #[serde(default = "default_delta_ttl_minutes")]
    pub delta_ttl_minutes: u64,

    /// Page size used when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Interval of the expired-item sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_days() -> u64 {
    30
}
fn default_delta_ttl_minutes() -> u64 {
    24 * 60
}
fn default_limit() -> usize {
    100
}
fn default_max_limit() -> usize {
    1000
}
fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            delta_ttl_minutes: default_delta_ttl_minutes(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StoreConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    pub fn delta_ttl(&self) -> Duration {
        Duration::from_secs(self.delta_ttl_minutes * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Resolve a requested page size: default when absent, clamped to `1..=max_limit`.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.retention(), Duration::from_secs(30 * 86_400));
        assert_eq!(cfg.page_limit(None), 100);
    }

    #[test]
    fn test_page_limit_is_clamped() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.page_limit(Some(0)), 1);
        assert_eq!(cfg.page_limit(Some(5000)), 1000);
        assert_eq!(cfg.page_limit(Some(2)), 2);
    }
}
