#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use marquee_fetch::prelude::*;
use parking_lot::Mutex;

pub type Attempt<T> = BoxFuture<'static, Result<T, FetchError>>;

/// Fetcher that counts invocations and answers with `respond(call_number)`
/// after `delay`.
pub fn counting_fetcher<T, R>(
    calls: Arc<AtomicUsize>,
    delay: Duration,
    respond: R,
) -> impl Fn(CancellationToken) -> Attempt<T> + Send + Sync + 'static
where
    T: Send + 'static,
    R: Fn(usize) -> Result<T, FetchError> + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    move |_token| -> Attempt<T> {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let respond = Arc::clone(&respond);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            respond(call)
        })
    }
}

/// Wait until `key` leaves the loading state.
pub async fn settle<T>(store: &QueryStore<T>, key: &str) -> QueryState<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut rx = store.subscribe(key);
    let state = rx
        .wait_for(|state| !state.is_loading)
        .await
        .expect("store dropped the key while waiting");
    state.clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveEvent {
    Start(ResolveKey),
    End(ResolveKey),
}

/// Resolver that records call order and concurrency.
#[derive(Debug, Default)]
pub struct InstrumentedResolver {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    events: Mutex<Vec<ResolveEvent>>,
    /// `(entity id, image type)` pairs that have no artwork.
    missing: Mutex<HashSet<(String, ImageType)>>,
    /// Entity ids whose next resolution fails with a network error.
    fail_once: Mutex<HashSet<String>>,
    calls_per_entity: Mutex<HashMap<String, usize>>,
}

impl InstrumentedResolver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn with_missing(self, entity_id: &str, image_type: ImageType) -> Self {
        self.missing
            .lock()
            .insert((entity_id.to_owned(), image_type));
        self
    }

    pub fn with_fail_once(self, entity_id: &str) -> Self {
        self.fail_once.lock().insert(entity_id.to_owned());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<ResolveEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn started_keys(&self) -> Vec<ResolveKey> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ResolveEvent::Start(key) => Some(key.clone()),
                ResolveEvent::End(_) => None,
            })
            .collect()
    }

    pub fn calls_for(&self, entity_id: &str) -> usize {
        self.calls_per_entity
            .lock()
            .get(entity_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls_per_entity.lock().values().sum()
    }
}

#[async_trait]
impl ImageResolver for InstrumentedResolver {
    async fn resolve(
        &self,
        key: &ResolveKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, FetchError> {
        let id = key.entity_id.as_str().to_owned();
        *self.calls_per_entity.lock().entry(id.clone()).or_default() += 1;
        self.events.lock().push(ResolveEvent::Start(key.clone()));

        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(depth, Ordering::SeqCst);

        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.delay) => false,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(ResolveEvent::End(key.clone()));

        if cancelled {
            return Err(FetchError::cancelled());
        }
        if self.fail_once.lock().remove(&id) {
            return Err(FetchError::network("resolver unreachable"));
        }
        if self.missing.lock().contains(&(id, key.image_type)) {
            return Ok(None);
        }
        Ok(Some(format!("https://img.test/{key}")))
    }
}

/// Loader that remembers every URL it was asked to warm.
#[derive(Debug, Default)]
pub struct RecordingLoader {
    urls: Mutex<Vec<String>>,
}

impl RecordingLoader {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl AssetLoader for RecordingLoader {
    async fn prefetch(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        self.urls.lock().push(url.to_owned());
        Ok(())
    }
}

pub fn movie(id: &str) -> PrefetchEntity {
    PrefetchEntity::new(id, EntityKind::Movie)
}

pub fn movies(ids: &[&str]) -> Vec<PrefetchEntity> {
    ids.iter().copied().map(movie).collect()
}

pub fn episode(id: &str, series: &str) -> PrefetchEntity {
    PrefetchEntity::new(id, EntityKind::Episode).with_parent(series)
}

pub fn scheduler(
    max_concurrent: usize,
) -> (Arc<PrefetchScheduler>, Arc<RecordingLoader>) {
    marquee_fetch::logging::init();
    let loader = Arc::new(RecordingLoader::default());
    let scheduler = PrefetchScheduler::new(
        PrefetchOptions {
            max_concurrent,
            ..PrefetchOptions::default()
        },
        loader.clone(),
    );
    (Arc::new(scheduler), loader)
}
