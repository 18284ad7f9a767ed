use std::future::Future;
use std::time::Duration;

use futures::Stream;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::config::QueryConfig;
use super::state::QueryState;
use super::store::QueryStore;
use crate::constants::QUERY_POLL_INTERVAL;
use crate::error::FetchError;

/// Polling view of one query for render loops.
///
/// `observe` only hits `execute_query` when the observed `(key, enabled)` pair
/// changes; every other call is a cheap read.
#[derive(Debug)]
pub struct QueryObserver<T> {
    store: QueryStore<T>,
    poll_interval: Duration,
    last_trigger: Option<(String, bool)>,
}

impl<T> QueryObserver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(store: QueryStore<T>) -> Self {
        Self {
            store,
            poll_interval: QUERY_POLL_INTERVAL,
            last_trigger: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn observe<F, Fut>(
        &mut self,
        key: &str,
        config: QueryConfig,
        fetcher: F,
    ) -> QueryState<T>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let enabled = config.enabled;
        let trigger_changed = self
            .last_trigger
            .as_ref()
            .is_none_or(|(last_key, last_enabled)| {
                last_key != key || *last_enabled != enabled
            });

        if trigger_changed {
            self.last_trigger = Some((key.to_owned(), enabled));
            self.store.execute_query(key, config, fetcher);
        }

        with_placeholder(self.store.get_query(key), enabled)
    }

    /// Poll until `key` is no longer loading.
    pub async fn settle(&self, key: &str) -> QueryState<T> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let state = self.store.get_query(key);
            if !state.is_loading {
                return state;
            }
        }
    }

    pub fn store(&self) -> &QueryStore<T> {
        &self.store
    }
}

/// Stream of states for one query: the state right after triggering, then one
/// item per status change until the query settles.
pub fn observe_stream<T, F, Fut>(
    store: QueryStore<T>,
    key: String,
    config: QueryConfig,
    fetcher: F,
    poll_interval: Duration,
) -> impl Stream<Item = QueryState<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async_stream::stream! {
        let enabled = config.enabled;
        let initial = with_placeholder(
            store.execute_query(key.clone(), config, fetcher),
            enabled,
        );
        let mut last_status = initial.status();
        let settled = !initial.is_loading;
        yield initial;

        if !settled {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let state = store.get_query(&key);
                let done = !state.is_loading;
                if state.status() != last_status || done {
                    last_status = state.status();
                    yield state;
                }
                if done {
                    break;
                }
            }
        }
    }
}

fn with_placeholder<T>(state: QueryState<T>, enabled: bool) -> QueryState<T> {
    if enabled && state.is_empty() {
        QueryState::loading()
    } else {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryStatus;
    use futures::StreamExt;
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Attempt = BoxFuture<'static, Result<u32, FetchError>>;

    fn counting_fetcher(
        calls: Arc<AtomicU32>,
    ) -> impl Fn(CancellationToken) -> Attempt + Send + Sync + 'static {
        move |_| -> Attempt {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_once_per_key_and_enabled_change() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = QueryStore::new();
        let mut observer = QueryObserver::new(store.clone());
        let config = QueryConfig::default().stale_time(Duration::ZERO);

        let fetch = || counting_fetcher(calls.clone());
        let first = observer.observe("k", config.clone(), fetch());
        assert!(first.is_loading);
        for _ in 0..5 {
            observer.observe("k", config.clone(), fetch());
        }
        let settled = observer.settle("k").await;
        assert_eq!(settled.data, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        observer.observe("k", config.clone().enabled(false), fetch());
        observer.observe("k", config, fetch());
        observer.settle("k").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_observer_reports_idle() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut observer = QueryObserver::new(QueryStore::new());
        let state = observer.observe(
            "k",
            QueryConfig::default().enabled(false),
            counting_fetcher(calls.clone()),
        );
        assert_eq!(state.status(), QueryStatus::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_loading_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let states: Vec<_> = observe_stream(
            QueryStore::new(),
            "k".to_owned(),
            QueryConfig::default(),
            counting_fetcher(calls),
            Duration::from_millis(50),
        )
        .collect()
        .await;

        let statuses: Vec<_> = states.iter().map(QueryState::status).collect();
        assert_eq!(statuses, vec![QueryStatus::Loading, QueryStatus::Success]);
        assert_eq!(states[1].data, Some(1));
    }
}
