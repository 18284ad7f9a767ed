use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use marquee_config::QuerySettings;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::QueryConfig;
use super::retry::{AttemptOutcome, run_with_retry};
use super::state::QueryState;
use crate::constants::QUERY_REFRESH_HORIZON;
use crate::error::{ErrorKind, FetchError};
use crate::time::{Clock, system_clock};

/// Construction options for a [`QueryStore`].
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Age after which `refresh_stale_queries` marks a key stale.
    pub refresh_horizon: Duration,
    pub clock: Arc<dyn Clock>,
    /// Token every job token is derived from; cancelling it stops all jobs.
    pub parent: Option<CancellationToken>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            refresh_horizon: QUERY_REFRESH_HORIZON,
            clock: system_clock(),
            parent: None,
        }
    }
}

impl StoreOptions {
    pub fn from_settings(settings: &QuerySettings) -> Self {
        Self {
            refresh_horizon: settings.refresh_horizon(),
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_parent(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }
}

struct JobHandle {
    id: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
    /// Error the key showed before this job started, restored on cancel.
    prior_error: Option<(String, Option<ErrorKind>)>,
}

impl JobHandle {
    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

struct StoreInner<T> {
    states: DashMap<String, watch::Sender<QueryState<T>>>,
    jobs: Mutex<HashMap<String, JobHandle>>,
    root: CancellationToken,
    next_job_id: AtomicU64,
    clock: Arc<dyn Clock>,
    refresh_horizon: Duration,
}

/// Key-addressed store of async query results.
///
/// Cloning is cheap and clones share state. At most one job is registered per
/// key; only the registered job may write that key's state, so a cancelled or
/// superseded job can never overwrite a newer result.
pub struct QueryStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for QueryStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for QueryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStore")
            .field("keys", &self.inner.states.len())
            .field("jobs", &self.inner.jobs.lock().len())
            .field("cancelled", &self.inner.root.is_cancelled())
            .finish()
    }
}

impl<T> Default for QueryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        let root = options
            .parent
            .map(|parent| parent.child_token())
            .unwrap_or_default();
        Self {
            inner: Arc::new(StoreInner {
                states: DashMap::new(),
                jobs: Mutex::new(HashMap::new()),
                root,
                next_job_id: AtomicU64::new(1),
                clock: options.clock,
                refresh_horizon: options.refresh_horizon,
            }),
        }
    }

    /// Start a fetch for `key` unless one is already running or the cached
    /// data is still fresh, and return the state as of this call.
    ///
    /// The fetch runs on a spawned task; observe the key through
    /// [`QueryStore::subscribe`] or [`QueryStore::get_query`].
    pub fn execute_query<F, Fut>(
        &self,
        key: impl Into<String>,
        config: QueryConfig,
        fetcher: F,
    ) -> QueryState<T>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let key = key.into();
        if !config.enabled {
            return self.get_query(&key);
        }

        let mut jobs = self.inner.jobs.lock();
        if let Some(job) = jobs.get(&key) {
            if job.is_active() {
                log::trace!("Query {} already in flight", key);
                return self.get_query(&key);
            }
            jobs.remove(&key);
        }

        let current = self.get_query(&key);
        if current.is_fresh(self.inner.clock.now(), config.stale_time) {
            return current;
        }

        if self.inner.root.is_cancelled() {
            log::debug!("Query {} ignored: store has been shut down", key);
            return current;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("Query {} requested outside a tokio runtime", key);
            return current;
        };

        let id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();
        let prior_error = current.is_error.then(|| {
            (current.error.clone().unwrap_or_default(), current.error_kind)
        });

        self.inner.update(&key, QueryState::begin_loading);

        let task = runtime.spawn(run_job(
            Arc::clone(&self.inner),
            key.clone(),
            id,
            config,
            fetcher,
            token.clone(),
        ));
        jobs.insert(
            key.clone(),
            JobHandle {
                id,
                token,
                task,
                prior_error,
            },
        );
        drop(jobs);

        log::debug!("Query {} started (job {})", key, id);
        self.get_query(&key)
    }

    /// Current state of `key`; idle if the key is unknown.
    pub fn get_query(&self, key: &str) -> QueryState<T> {
        self.inner
            .states
            .get(key)
            .map(|state| state.borrow().clone())
            .unwrap_or_default()
    }

    /// Receiver that observes every state change of `key`.
    pub fn subscribe(&self, key: &str) -> watch::Receiver<QueryState<T>> {
        self.inner
            .states
            .entry(key.to_owned())
            .or_insert_with(|| watch::channel(QueryState::idle()).0)
            .subscribe()
    }

    /// Mark `key` stale so the next `execute_query` refetches it. Data stays
    /// visible in the meantime.
    pub fn invalidate_query(&self, key: &str) -> bool {
        match self.inner.states.get(key) {
            Some(state) => {
                state.send_modify(|state| state.is_stale = true);
                true
            }
            None => false,
        }
    }

    /// Mark stale every key containing `pattern`.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut count = 0;
        for state in self.inner.states.iter() {
            if state.key().contains(pattern) {
                state.send_modify(|state| state.is_stale = true);
                count += 1;
            }
        }
        log::debug!("Invalidated {} queries matching {:?}", count, pattern);
        count
    }

    /// Cancel the running job for `key`, if any.
    ///
    /// The key returns to the status it had before the job started.
    pub fn cancel_query(&self, key: &str) -> bool {
        let mut jobs = self.inner.jobs.lock();
        let Some(job) = jobs.remove(key) else {
            return false;
        };
        job.token.cancel();
        if let Some(state) = self.inner.states.get(key) {
            state.send_modify(|state| restore_settled(state, job.prior_error));
        }
        log::debug!("Query {} cancelled (job {})", key, job.id);
        true
    }

    /// Mark stale every settled key whose data is older than the refresh
    /// horizon. Returns how many keys were marked.
    pub fn refresh_stale_queries(&self) -> usize {
        let now = self.inner.clock.now();
        let horizon = self.inner.refresh_horizon;
        let mut count = 0;
        for state in self.inner.states.iter() {
            state.send_if_modified(|state| {
                let expired = !state.is_loading
                    && !state.is_stale
                    && state.age(now).is_some_and(|age| age > horizon);
                if expired {
                    state.is_stale = true;
                    count += 1;
                }
                expired
            });
        }
        if count > 0 {
            log::debug!("Marked {} queries stale", count);
        }
        count
    }

    /// Write `value` as if a fetch had just succeeded.
    pub fn set_query_data(&self, key: &str, value: T) {
        let now = self.inner.clock.now();
        self.inner.update(key, |state| {
            state.data = Some(value);
            state.is_error = false;
            state.error = None;
            state.error_kind = None;
            state.is_stale = false;
            state.last_fetched = Some(now);
        });
    }

    pub fn is_fetching(&self, key: &str) -> bool {
        self.inner
            .jobs
            .lock()
            .get(key)
            .is_some_and(JobHandle::is_active)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner
            .jobs
            .lock()
            .values()
            .filter(|job| job.is_active())
            .count()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner
            .states
            .iter()
            .map(|state| state.key().clone())
            .collect()
    }

    /// Cancel every job and forget every key.
    ///
    /// Subscribers see one final idle state before their channel closes.
    pub fn cleanup(&self) {
        let mut jobs = self.inner.jobs.lock();
        let cancelled = jobs.len();
        for (_, job) in jobs.drain() {
            job.token.cancel();
        }
        for state in self.inner.states.iter() {
            state.send_replace(QueryState::idle());
        }
        self.inner.states.clear();
        drop(jobs);

        log::debug!("Query store cleared ({} jobs cancelled)", cancelled);
    }

    /// Cancel the store's root token. Later `execute_query` calls are no-ops.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }
}

impl<T> StoreInner<T> {
    fn update(&self, key: &str, modify: impl FnOnce(&mut QueryState<T>)) {
        self.states
            .entry(key.to_owned())
            .or_insert_with(|| watch::channel(QueryState::idle()).0)
            .send_modify(modify);
    }

    fn finish(&self, key: &str, id: u64, outcome: AttemptOutcome<T>) {
        let mut jobs = self.jobs.lock();
        if jobs.get(key).is_none_or(|job| job.id != id) {
            log::trace!("Dropping result of superseded job {} for {}", id, key);
            return;
        }
        let prior_error = jobs.remove(key).and_then(|job| job.prior_error);

        match outcome {
            AttemptOutcome::Success { value, attempts } => {
                let now = self.clock.now();
                self.update(key, |state| {
                    state.data = Some(value);
                    state.is_loading = false;
                    state.is_error = false;
                    state.error = None;
                    state.error_kind = None;
                    state.is_stale = false;
                    state.last_fetched = Some(now);
                });
                log::debug!(
                    "Query {} succeeded after {} attempt(s)",
                    key,
                    attempts
                );
            }
            AttemptOutcome::Failed { error, attempts } => {
                log::warn!(
                    "Query {} failed after {} attempt(s): {} ({})",
                    key,
                    attempts,
                    error,
                    error.kind()
                );
                self.update(key, |state| {
                    state.is_loading = false;
                    state.is_error = true;
                    state.error = Some(error.message().to_owned());
                    state.error_kind = Some(error.kind());
                });
            }
            AttemptOutcome::Cancelled => {
                self.update(key, |state| restore_settled(state, prior_error));
            }
        }
    }
}

fn restore_settled<T>(
    state: &mut QueryState<T>,
    prior_error: Option<(String, Option<ErrorKind>)>,
) {
    state.is_loading = false;
    if let Some((message, kind)) = prior_error {
        state.is_error = true;
        state.error = Some(message);
        state.error_kind = kind;
    }
}

async fn run_job<T, F, Fut>(
    inner: Arc<StoreInner<T>>,
    key: String,
    id: u64,
    config: QueryConfig,
    fetcher: F,
    token: CancellationToken,
) where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let outcome = run_with_retry(&key, &config, &fetcher, &token).await;
    inner.finish(&key, id, outcome);
}
