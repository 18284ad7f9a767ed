//! Session-scoped ownership of the query store and evicting cache.
//!
//! Everything cached on behalf of one identity hangs off a [`SessionScope`].
//! Switching identity tears the scope down (jobs cancelled, state dropped)
//! and builds a fresh one; the prefetch caches outlive scopes and are only
//! cleared on logout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use marquee_config::{FetchLayerConfig, QuerySettings};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::cache::{EvictingCache, EvictionPolicy};
use crate::error::FetchError;
use crate::prefetch::{AssetLoader, PrefetchScheduler};
use crate::query::{QueryConfig, QueryObserver, QueryStore, StoreOptions};
use crate::time::{Clock, system_clock};

/// State owned on behalf of one signed-in identity.
pub struct SessionScope<T> {
    identity: String,
    root: CancellationToken,
    query_settings: QuerySettings,
    store: QueryStore<T>,
    cache: Mutex<EvictingCache<String, T>>,
}

impl<T> fmt::Debug for SessionScope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("identity", &self.identity)
            .field("torn_down", &self.root.is_cancelled())
            .field("store", &self.store)
            .field("cache", &*self.cache.lock())
            .finish()
    }
}

impl<T> SessionScope<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(identity: impl Into<String>, config: &FetchLayerConfig) -> Self {
        Self::with_clock(identity, config, system_clock())
    }

    pub fn with_clock(
        identity: impl Into<String>,
        config: &FetchLayerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let root = CancellationToken::new();
        let store = QueryStore::with_options(
            StoreOptions::from_settings(&config.query)
                .with_clock(Arc::clone(&clock))
                .with_parent(root.clone()),
        );
        let policy = EvictionPolicy::from(&config.cache);
        let cache = EvictingCache::with_clock(policy, clock);

        Self {
            identity: identity.into(),
            root,
            query_settings: config.query.clone(),
            store,
            cache: Mutex::new(cache),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn store(&self) -> &QueryStore<T> {
        &self.store
    }

    /// Query policy built from the configured defaults.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::from(&self.query_settings)
    }

    /// Polling observer over this session's store.
    pub fn observer(&self) -> QueryObserver<T> {
        QueryObserver::new(self.store.clone())
            .with_poll_interval(self.query_settings.poll_interval())
    }

    /// Token every job of this session derives from.
    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Read-through lookup on the session cache.
    ///
    /// A cached value younger than `stale_time` is returned as is; otherwise
    /// `fetcher` runs once under a child of the session token and its result
    /// replaces the entry. Failures leave the cache untouched.
    pub async fn fetch_cached<F, Fut>(
        &self,
        key: &str,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<T, FetchError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        {
            let mut cache = self.cache.lock();
            if !cache.is_stale(key, stale_time)
                && let Some(value) = cache.get(key)
            {
                return Ok(value.clone());
            }
        }

        if self.root.is_cancelled() {
            return Err(FetchError::cancelled());
        }

        let token = self.root.child_token();
        let value = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(FetchError::cancelled()),
            result = fetcher(token.clone()) => result?,
        };

        self.cache.lock().put(key.to_owned(), value.clone());
        Ok(value)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn invalidate_cached(&self, key: &str) -> bool {
        self.cache.lock().invalidate(key).is_some()
    }

    /// Cancel every job of this session and drop all cached state.
    pub fn teardown(&self) {
        self.root.cancel();
        self.store.cleanup();
        self.cache.lock().clear();
        log::info!("Session scope for {} torn down", self.identity);
    }

    pub fn is_torn_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// Tracks the active [`SessionScope`] and the process-wide prefetch caches.
pub struct SessionManager<T> {
    config: FetchLayerConfig,
    clock: Arc<dyn Clock>,
    active: RwLock<Option<Arc<SessionScope<T>>>>,
    prefetch: Arc<PrefetchScheduler>,
}

impl<T> fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self
            .active
            .read()
            .as_ref()
            .map(|scope| scope.identity.clone());
        f.debug_struct("SessionManager")
            .field("active", &active)
            .field("prefetch", &self.prefetch)
            .finish()
    }
}

impl<T> SessionManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        config: FetchLayerConfig,
        prefetch: Arc<PrefetchScheduler>,
    ) -> Self {
        Self::with_clock(config, prefetch, system_clock())
    }

    pub fn with_clock(
        config: FetchLayerConfig,
        prefetch: Arc<PrefetchScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            active: RwLock::new(None),
            prefetch,
        }
    }

    /// Load [`FetchLayerConfig`] from its layered sources and size a fresh
    /// prefetch scheduler from it.
    pub fn from_env(loader: Arc<dyn AssetLoader>) -> anyhow::Result<Self> {
        let loaded = FetchLayerConfig::load_from_env()?;
        if loaded.is_default() {
            log::info!("No fetch configuration found, using defaults");
        }
        let prefetch = Arc::new(PrefetchScheduler::from_settings(
            &loaded.config.prefetch,
            loader,
        ));
        Ok(Self::new(loaded.config, prefetch))
    }

    pub fn current(&self) -> Option<Arc<SessionScope<T>>> {
        self.active.read().clone()
    }

    pub fn prefetch(&self) -> &Arc<PrefetchScheduler> {
        &self.prefetch
    }

    pub fn config(&self) -> &FetchLayerConfig {
        &self.config
    }

    /// Make `identity` the active session.
    ///
    /// Re-selecting the active identity returns the existing scope untouched.
    /// Otherwise the previous scope is torn down before the new one is
    /// installed.
    pub fn switch_identity(&self, identity: &str) -> Arc<SessionScope<T>> {
        let mut active = self.active.write();
        if let Some(scope) = active.as_ref()
            && scope.identity() == identity
        {
            return Arc::clone(scope);
        }

        if let Some(previous) = active.take() {
            previous.teardown();
        }

        let scope = Arc::new(SessionScope::with_clock(
            identity,
            &self.config,
            Arc::clone(&self.clock),
        ));
        *active = Some(Arc::clone(&scope));
        log::info!("Switched session to {}", identity);
        scope
    }

    /// Tear down the active session and forget all prefetch state.
    pub fn logout(&self) {
        if let Some(previous) = self.active.write().take() {
            previous.teardown();
        }
        self.prefetch.clear();
        log::info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[tokio::test]
    async fn fetch_cached_reads_through_until_stale() {
        let clock = ManualClock::new();
        let scope: SessionScope<u32> = SessionScope::with_clock(
            "alice",
            &FetchLayerConfig::default(),
            Arc::new(clock.clone()),
        );
        let stale = Duration::from_secs(10);

        let first = scope.fetch_cached("k", stale, |_| async { Ok(1) }).await;
        let second = scope.fetch_cached("k", stale, |_| async { Ok(2) }).await;
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));

        clock.advance(Duration::from_secs(11));
        let third = scope.fetch_cached("k", stale, |_| async { Ok(3) }).await;
        assert_eq!(third, Ok(3));
        assert_eq!(scope.cached_len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let scope: SessionScope<u32> =
            SessionScope::new("bob", &FetchLayerConfig::default());
        let stale = Duration::from_secs(10);

        let failed = scope
            .fetch_cached("k", stale, |_| async {
                Err(FetchError::network("offline"))
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(scope.cached_len(), 0);
    }

    #[tokio::test]
    async fn torn_down_scope_refuses_fetches() {
        let scope: SessionScope<u32> =
            SessionScope::new("carol", &FetchLayerConfig::default());
        scope.teardown();
        let result = scope
            .fetch_cached("k", Duration::from_secs(1), |_| async { Ok(1) })
            .await;
        assert_eq!(
            result.map_err(|err| err.kind()),
            Err(crate::ErrorKind::Cancelled)
        );
        assert!(scope.store().is_shut_down());
    }
}
