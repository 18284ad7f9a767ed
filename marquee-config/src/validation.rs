use thiserror::Error;

use crate::models::FetchLayerConfig;

/// Settings that would leave the fetch layer unable to make progress.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("cache.capacity must be at least 1")]
    ZeroCacheCapacity,

    #[error("prefetch.max_concurrent must be at least 1")]
    ZeroPrefetchPermits,

    #[error("query.request_timeout_ms must be greater than zero")]
    ZeroRequestTimeout,

    #[error("query.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error(
        "prefetch.continue_watching_priority ({priority}) exceeds \
         continue_watching_max_items ({max_items})"
    )]
    PriorityExceedsBatch { priority: usize, max_items: usize },
}

impl FetchLayerConfig {
    /// Reject configurations that cannot work; returns the first violation.
    pub fn validate(&self) -> Result<(), ConfigGuardRailError> {
        if self.cache.capacity == 0 {
            return Err(ConfigGuardRailError::ZeroCacheCapacity);
        }
        if self.prefetch.max_concurrent == 0 {
            return Err(ConfigGuardRailError::ZeroPrefetchPermits);
        }
        if self.query.request_timeout_ms == 0 {
            return Err(ConfigGuardRailError::ZeroRequestTimeout);
        }
        if self.query.poll_interval_ms == 0 {
            return Err(ConfigGuardRailError::ZeroPollInterval);
        }
        if self.prefetch.continue_watching_priority
            > self.prefetch.continue_watching_max_items
        {
            return Err(ConfigGuardRailError::PriorityExceedsBatch {
                priority: self.prefetch.continue_watching_priority,
                max_items: self.prefetch.continue_watching_max_items,
            });
        }
        Ok(())
    }
}
