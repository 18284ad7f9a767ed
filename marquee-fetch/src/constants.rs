use std::time::Duration;

/// Default entry cap for the session evicting cache.
pub const CACHE_CAPACITY: usize = 50;

/// Entries not read for this long are dropped by the sweep.
pub const CACHE_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Minimum spacing between two cache sweeps.
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Horizon used by `refresh_stale_queries`.
pub const QUERY_REFRESH_HORIZON: Duration = Duration::from_secs(5 * 60);

/// Poll cadence for the observer bridge.
pub const QUERY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Permits shared by all prefetch entry points.
pub const PREFETCH_MAX_CONCURRENT: usize = 64;
