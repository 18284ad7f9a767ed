use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level knobs for the fetch layer. Every section carries defaults so a
/// partial file only needs to mention what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchLayerConfig {
    /// Session-scoped evicting cache sizing and sweep cadence.
    pub cache: CacheSettings,
    /// Default query policy applied when callers do not override it.
    pub query: QuerySettings,
    /// Image prefetch fan-out and rendition sizes.
    pub prefetch: PrefetchSettings,
}

/// Bounds for the evicting cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Hard entry cap; the least recently used entry is dropped beyond it.
    pub capacity: usize,
    /// Entries not read for this long are dropped by the sweep (ms).
    pub idle_ttl_ms: u64,
    /// Minimum spacing between two sweeps (ms).
    pub sweep_interval_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 50,
            idle_ttl_ms: 60 * 60 * 1_000,
            sweep_interval_ms: 5 * 60 * 1_000,
        }
    }
}

impl CacheSettings {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Default per-request query policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Age after which cached data may be refetched (ms).
    pub stale_time_ms: u64,
    /// Extra attempts after the first failure.
    pub retry_count: u32,
    /// Base retry delay, multiplied by the attempt number (ms).
    pub retry_delay_ms: u64,
    /// Hard deadline for a single attempt (ms).
    pub request_timeout_ms: u64,
    /// Horizon used by `refresh_stale_queries` when the view regains focus
    /// (ms).
    pub refresh_horizon_ms: u64,
    /// Poll cadence for the observer bridge (ms).
    pub poll_interval_ms: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            stale_time_ms: 5 * 60 * 1_000,
            retry_count: 3,
            retry_delay_ms: 1_000,
            request_timeout_ms: 30_000,
            refresh_horizon_ms: 5 * 60 * 1_000,
            poll_interval_ms: 50,
        }
    }
}

impl QuerySettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_horizon(&self) -> Duration {
        Duration::from_millis(self.refresh_horizon_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Prefetch fan-out and the renditions warmed for each row type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSettings {
    /// Permits shared by every prefetch entry point.
    pub max_concurrent: usize,
    /// Batch cap used by `warm_grid`.
    pub critical_max_items: usize,
    /// Batch cap used by `warm_continue_watching`.
    pub continue_watching_max_items: usize,
    /// Leading continue-watching items `warm_continue_watching` resolves
    /// strictly in order.
    pub continue_watching_priority: usize,
    pub primary_width: u32,
    pub primary_height: u32,
    pub primary_quality: u8,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub thumb_quality: u8,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 64,
            critical_max_items: 30,
            continue_watching_max_items: 12,
            continue_watching_priority: 4,
            primary_width: 300,
            primary_height: 450,
            primary_quality: 90,
            thumb_width: 640,
            thumb_height: 360,
            thumb_quality: 85,
        }
    }
}
