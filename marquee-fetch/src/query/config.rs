use std::time::Duration;

use marquee_config::QuerySettings;

/// Per-request query policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Age after which cached data is eligible for refetch.
    pub stale_time: Duration,
    /// Extra attempts after the first failure.
    pub retry_count: u32,
    /// Base delay; attempt `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
    /// Disabled queries never fetch.
    pub enabled: bool,
    /// Hard deadline for a single attempt.
    pub request_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::from(&QuerySettings::default())
    }
}

impl From<&QuerySettings> for QueryConfig {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            stale_time: settings.stale_time(),
            retry_count: settings.retry_count,
            retry_delay: settings.retry_delay(),
            enabled: true,
            request_timeout: settings.request_timeout(),
        }
    }
}

impl QueryConfig {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}
