use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorKind;

/// Coarse lifecycle of a key: `Idle → Loading → (Success | Error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one key in the query store.
///
/// `is_loading` and `is_error` are never both set. A failed refetch keeps the
/// last good `data` so the UI does not flash to empty.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Set by invalidation; forces the next `execute_query` to refetch.
    pub is_stale: bool,
    /// When `data` was last written by a successful fetch.
    pub last_fetched: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> QueryState<T> {
    /// State of a key that has never been queried.
    pub fn idle() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_error: false,
            error: None,
            error_kind: None,
            is_stale: false,
            last_fetched: None,
        }
    }

    /// Placeholder surfaced by the observer before the first value arrives.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::idle()
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some() && !self.is_error
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none() && !self.is_loading && !self.is_error
    }

    pub fn status(&self) -> QueryStatus {
        if self.is_loading {
            QueryStatus::Loading
        } else if self.is_error {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        }
    }

    /// Age of `data` at `now`; `None` if nothing has been fetched yet.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_fetched.map(|fetched| now.duration_since(fetched))
    }

    /// Whether the cached data may be served without refetching.
    pub fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        self.data.is_some()
            && !self.is_stale
            && self.age(now).is_some_and(|age| age <= stale_time)
    }

    pub(crate) fn begin_loading(&mut self) {
        self.is_loading = true;
        self.is_error = false;
        self.error = None;
        self.error_kind = None;
    }
}
