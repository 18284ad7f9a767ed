//! Time source abstraction
//!
//! Staleness and idle sweeps read the clock through [`Clock`] so tests can
//! drive time by hand. The default [`TokioClock`] follows tokio's clock, which
//! also honours `tokio::time::pause` in async tests.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    fn now(&self) -> Instant;
}

/// Production clock backed by `tokio::time::Instant`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for deterministic tests.
#[derive(Clone, Debug)]
pub struct ManualClock {
    instant: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            instant: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.lock();
        *instant += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.instant.lock()
    }
}

pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(TokioClock)
}
