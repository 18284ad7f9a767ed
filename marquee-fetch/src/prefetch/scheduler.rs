use std::collections::HashSet;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;

use futures::future::join_all;
use marquee_config::PrefetchSettings;
use marquee_model::{
    EntityId, ImageDimensions, ImageType, PreferenceKey, PrefetchEntity,
    ResolveKey,
};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::caches::{EnqueueSet, PreferenceCache, ResolvedUrlCache};
use super::traits::{AssetLoader, ImageResolver, NoopLoader};
use crate::constants::PREFETCH_MAX_CONCURRENT;
use crate::error::FetchError;

/// Fan-out limit, batch sizes and the renditions each entry point warms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchOptions {
    pub max_concurrent: usize,
    /// Poster rendition used by `preload_critical`.
    pub primary: ImageDimensions,
    /// Landscape rendition used by `preload_continue_watching`.
    pub thumb: ImageDimensions,
    /// Batch cap for [`PrefetchScheduler::warm_grid`].
    pub critical_max_items: usize,
    /// Batch cap for [`PrefetchScheduler::warm_continue_watching`].
    pub continue_watching_max_items: usize,
    /// In-order prefix for [`PrefetchScheduler::warm_continue_watching`].
    pub continue_watching_priority: usize,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: PREFETCH_MAX_CONCURRENT,
            ..Self::from(&PrefetchSettings::default())
        }
    }
}

impl From<&PrefetchSettings> for PrefetchOptions {
    fn from(settings: &PrefetchSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1),
            primary: ImageDimensions::new(
                settings.primary_width,
                settings.primary_height,
                settings.primary_quality,
            ),
            thumb: ImageDimensions::new(
                settings.thumb_width,
                settings.thumb_height,
                settings.thumb_quality,
            ),
            critical_max_items: settings.critical_max_items,
            continue_watching_max_items: settings.continue_watching_max_items,
            continue_watching_priority: settings.continue_watching_priority,
        }
    }
}

/// Per-batch tally. `requested` counts entities left after dedup and
/// truncation; each of them lands in exactly one other bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub requested: usize,
    /// Already queued by an earlier or concurrent call.
    pub skipped: usize,
    pub warmed: usize,
    /// No artwork, resolver error or loader error.
    pub failed: usize,
    pub cancelled: usize,
}

impl AddAssign for PrefetchReport {
    fn add_assign(&mut self, other: Self) {
        self.requested += other.requested;
        self.skipped += other.skipped;
        self.warmed += other.warmed;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
    }
}

#[derive(Debug)]
enum WarmOutcome {
    Warmed,
    Unavailable,
    Failed(FetchError),
    Cancelled,
}

/// Bounded image URL resolution and warm-up for entity batches.
///
/// One semaphore bounds resolver work across every entry point. Resolved URLs
/// and learned slot preferences live for the process and are only dropped by
/// [`PrefetchScheduler::clear`].
pub struct PrefetchScheduler {
    permits: Semaphore,
    options: PrefetchOptions,
    urls: ResolvedUrlCache,
    preferences: PreferenceCache,
    critical_marks: EnqueueSet,
    continue_marks: EnqueueSet,
    loader: Arc<dyn AssetLoader>,
}

impl fmt::Debug for PrefetchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchScheduler")
            .field("capacity", &self.options.max_concurrent)
            .field("available_permits", &self.permits.available_permits())
            .field("cached_urls", &self.urls.len())
            .field("preferences", &self.preferences.len())
            .field("critical_marks", &self.critical_marks.len())
            .field("continue_marks", &self.continue_marks.len())
            .finish()
    }
}

impl Default for PrefetchScheduler {
    fn default() -> Self {
        Self::new(PrefetchOptions::default(), Arc::new(NoopLoader))
    }
}

impl PrefetchScheduler {
    pub fn new(options: PrefetchOptions, loader: Arc<dyn AssetLoader>) -> Self {
        let max_concurrent = options.max_concurrent.max(1);
        Self {
            permits: Semaphore::new(max_concurrent),
            options: PrefetchOptions {
                max_concurrent,
                ..options
            },
            urls: ResolvedUrlCache::new(),
            preferences: PreferenceCache::new(),
            critical_marks: EnqueueSet::new(),
            continue_marks: EnqueueSet::new(),
            loader,
        }
    }

    pub fn from_settings(
        settings: &PrefetchSettings,
        loader: Arc<dyn AssetLoader>,
    ) -> Self {
        Self::new(PrefetchOptions::from(settings), loader)
    }

    /// [`Self::preload_critical`] with the configured batch cap.
    pub async fn warm_grid(
        &self,
        entities: &[PrefetchEntity],
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> PrefetchReport {
        self.preload_critical(
            entities,
            resolver,
            self.options.critical_max_items,
            cancel,
        )
        .await
    }

    /// [`Self::preload_continue_watching`] with the configured batch cap
    /// and in-order prefix.
    pub async fn warm_continue_watching(
        &self,
        entities: &[PrefetchEntity],
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> PrefetchReport {
        self.preload_continue_watching(
            entities,
            resolver,
            self.options.continue_watching_max_items,
            self.options.continue_watching_priority,
            cancel,
        )
        .await
    }

    /// Warm the primary poster of up to `max_items` entities, all in parallel
    /// under the shared permit pool.
    pub async fn preload_critical(
        &self,
        entities: &[PrefetchEntity],
        resolver: &dyn ImageResolver,
        max_items: usize,
        cancel: &CancellationToken,
    ) -> PrefetchReport {
        let batch = dedupe_batch(entities, max_items);
        let mut report = PrefetchReport {
            requested: batch.len(),
            ..PrefetchReport::default()
        };

        let queued: Vec<&PrefetchEntity> = batch
            .into_iter()
            .filter(|entity| {
                let fresh = self.critical_marks.try_mark(&entity.id);
                if !fresh {
                    report.skipped += 1;
                }
                fresh
            })
            .collect();

        let outcomes = join_all(
            queued
                .iter()
                .map(|entity| self.warm_primary(entity, resolver, cancel)),
        )
        .await;

        for (entity, outcome) in queued.into_iter().zip(outcomes) {
            record(&mut report, &self.critical_marks, &entity.id, outcome);
        }

        log::debug!(
            "Critical prefetch: {} requested, {} skipped, {} warmed, {} failed",
            report.requested,
            report.skipped,
            report.warmed,
            report.failed
        );
        report
    }

    /// Warm landscape artwork for the continue-watching row.
    ///
    /// The first `priority_count` entities are resolved one after another in
    /// row order; the rest start only once that prefix is done and then run
    /// in parallel.
    pub async fn preload_continue_watching(
        &self,
        entities: &[PrefetchEntity],
        resolver: &dyn ImageResolver,
        max_items: usize,
        priority_count: usize,
        cancel: &CancellationToken,
    ) -> PrefetchReport {
        let batch = dedupe_batch(entities, max_items);
        let mut report = PrefetchReport {
            requested: batch.len(),
            ..PrefetchReport::default()
        };

        let split = priority_count.min(batch.len());
        let (priority, remainder) = batch.split_at(split);

        for entity in priority {
            if !self.continue_marks.try_mark(&entity.id) {
                report.skipped += 1;
                continue;
            }
            let outcome = self.warm_slot(entity, resolver, cancel).await;
            record(&mut report, &self.continue_marks, &entity.id, outcome);
        }

        let queued: Vec<&PrefetchEntity> = remainder
            .iter()
            .copied()
            .filter(|entity| {
                let fresh = self.continue_marks.try_mark(&entity.id);
                if !fresh {
                    report.skipped += 1;
                }
                fresh
            })
            .collect();

        let outcomes = join_all(
            queued
                .iter()
                .map(|entity| self.warm_slot(entity, resolver, cancel)),
        )
        .await;

        for (entity, outcome) in queued.into_iter().zip(outcomes) {
            record(&mut report, &self.continue_marks, &entity.id, outcome);
        }

        log::debug!(
            "Continue-watching prefetch: {} requested ({} in order), \
             {} skipped, {} warmed, {} failed",
            report.requested,
            split,
            report.skipped,
            report.warmed,
            report.failed
        );
        report
    }

    /// Resolve the URL for one UI slot, trying the variant that worked last
    /// time first.
    ///
    /// Candidates are `requested` then `fallback`, each tried against the
    /// entity's own id and then its parent id. The first hit is cached and
    /// remembered as the slot's preference.
    pub async fn resolve_slot(
        &self,
        entity: &PrefetchEntity,
        requested: ImageType,
        fallback: ImageType,
        dims: ImageDimensions,
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, FetchError> {
        let Some(_permit) = self.acquire(cancel).await else {
            return Err(FetchError::cancelled());
        };
        self.resolve_slot_with_permit(
            entity, requested, fallback, dims, resolver, cancel,
        )
        .await
    }

    pub fn get_cached_url(&self, key: &ResolveKey) -> Option<String> {
        self.urls.get(key)
    }

    /// Store a URL resolved elsewhere; the first URL for a key wins.
    pub fn put_cached_url(
        &self,
        key: ResolveKey,
        url: impl Into<String>,
    ) -> String {
        self.urls.insert(key, url.into())
    }

    pub fn get_preferred_type(&self, key: &PreferenceKey) -> Option<ImageType> {
        self.preferences.get(key)
    }

    pub fn set_preferred_type(
        &self,
        key: PreferenceKey,
        image_type: ImageType,
    ) {
        self.preferences.set(key, image_type);
    }

    /// Forget every resolved URL, preference and enqueue mark.
    pub fn clear(&self) {
        self.urls.clear();
        self.preferences.clear();
        self.critical_marks.clear();
        self.continue_marks.clear();
        log::info!("Prefetch caches cleared");
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.options.max_concurrent
    }

    pub fn options(&self) -> PrefetchOptions {
        self.options
    }

    pub fn cached_url_count(&self) -> usize {
        self.urls.len()
    }

    /// Run [`Self::preload_critical`] on its own task.
    pub fn spawn_preload_critical(
        self: &Arc<Self>,
        entities: Vec<PrefetchEntity>,
        resolver: Arc<dyn ImageResolver>,
        max_items: usize,
        cancel: CancellationToken,
    ) -> JoinHandle<PrefetchReport> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler
                .preload_critical(
                    &entities,
                    resolver.as_ref(),
                    max_items,
                    &cancel,
                )
                .await
        })
    }

    /// Run [`Self::preload_continue_watching`] on its own task.
    pub fn spawn_preload_continue_watching(
        self: &Arc<Self>,
        entities: Vec<PrefetchEntity>,
        resolver: Arc<dyn ImageResolver>,
        max_items: usize,
        priority_count: usize,
        cancel: CancellationToken,
    ) -> JoinHandle<PrefetchReport> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler
                .preload_continue_watching(
                    &entities,
                    resolver.as_ref(),
                    max_items,
                    priority_count,
                    &cancel,
                )
                .await
        })
    }

    async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Option<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.permits.acquire() => permit.ok(),
        }
    }

    async fn warm_primary(
        &self,
        entity: &PrefetchEntity,
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> WarmOutcome {
        let Some(_permit) = self.acquire(cancel).await else {
            return WarmOutcome::Cancelled;
        };
        let key = ResolveKey::new(
            entity.id.clone(),
            ImageType::Primary,
            self.options.primary,
        );
        match self.resolve_cached(&key, resolver, cancel).await {
            Ok(Some(url)) => self.warm_url(&url, cancel).await,
            Ok(None) => WarmOutcome::Unavailable,
            Err(err) if err.is_cancelled() => WarmOutcome::Cancelled,
            Err(err) => WarmOutcome::Failed(err),
        }
    }

    async fn warm_slot(
        &self,
        entity: &PrefetchEntity,
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> WarmOutcome {
        let Some(_permit) = self.acquire(cancel).await else {
            return WarmOutcome::Cancelled;
        };
        let resolved = self
            .resolve_slot_with_permit(
                entity,
                ImageType::Thumb,
                ImageType::Backdrop,
                self.options.thumb,
                resolver,
                cancel,
            )
            .await;
        match resolved {
            Ok(Some(url)) => self.warm_url(&url, cancel).await,
            Ok(None) => WarmOutcome::Unavailable,
            Err(err) if err.is_cancelled() => WarmOutcome::Cancelled,
            Err(err) => WarmOutcome::Failed(err),
        }
    }

    async fn warm_url(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> WarmOutcome {
        match self.loader.prefetch(url, cancel).await {
            Ok(()) => WarmOutcome::Warmed,
            Err(err) if err.is_cancelled() => WarmOutcome::Cancelled,
            Err(err) => WarmOutcome::Failed(err),
        }
    }

    async fn resolve_slot_with_permit(
        &self,
        entity: &PrefetchEntity,
        requested: ImageType,
        fallback: ImageType,
        dims: ImageDimensions,
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, FetchError> {
        let preference_key = PreferenceKey::new(
            entity.id.clone(),
            entity.parent_id.clone(),
            entity.kind,
            requested,
            fallback,
        );

        let mut candidates = vec![requested];
        if fallback != requested {
            candidates.push(fallback);
        }
        if let Some(preferred) = self.preferences.get(&preference_key) {
            candidates.retain(|candidate| *candidate != preferred);
            candidates.insert(0, preferred);
        }

        let mut last_error = None;
        for image_type in candidates {
            for source_id in entity.source_ids() {
                if cancel.is_cancelled() {
                    return Err(FetchError::cancelled());
                }
                let key = ResolveKey::new(source_id.clone(), image_type, dims);
                match self.resolve_cached(&key, resolver, cancel).await {
                    Ok(Some(url)) => {
                        self.preferences.set(preference_key, image_type);
                        return Ok(Some(url));
                    }
                    Ok(None) => {}
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => {
                        log::debug!("Resolving {} failed: {}", key, err);
                        last_error = Some(err);
                    }
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    async fn resolve_cached(
        &self,
        key: &ResolveKey,
        resolver: &dyn ImageResolver,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, FetchError> {
        if let Some(url) = self.urls.get(key) {
            return Ok(Some(url));
        }
        match resolver.resolve(key, cancel).await? {
            Some(url) if !url.is_empty() => {
                Ok(Some(self.urls.insert(key.clone(), url)))
            }
            _ => Ok(None),
        }
    }
}

/// Drop empty and repeated ids, keep first-seen order, cap at `max_items`.
fn dedupe_batch(
    entities: &[PrefetchEntity],
    max_items: usize,
) -> Vec<&PrefetchEntity> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter(|entity| {
            !entity.id.is_empty() && seen.insert(entity.id.as_str())
        })
        .take(max_items)
        .collect()
}

fn record(
    report: &mut PrefetchReport,
    marks: &EnqueueSet,
    id: &EntityId,
    outcome: WarmOutcome,
) {
    match outcome {
        WarmOutcome::Warmed => report.warmed += 1,
        WarmOutcome::Unavailable => {
            marks.release(id);
            report.failed += 1;
            log::warn!("No artwork available for {}", id);
        }
        WarmOutcome::Failed(err) => {
            marks.release(id);
            report.failed += 1;
            log::warn!("Prefetch for {} failed: {} ({})", id, err, err.kind());
        }
        WarmOutcome::Cancelled => {
            marks.release(id);
            report.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_model::EntityKind;

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let entities = vec![
            PrefetchEntity::new("a", EntityKind::Movie),
            PrefetchEntity::new("", EntityKind::Movie),
            PrefetchEntity::new("b", EntityKind::Movie),
            PrefetchEntity::new("a", EntityKind::Movie),
            PrefetchEntity::new("c", EntityKind::Movie),
        ];
        let ids: Vec<&str> = dedupe_batch(&entities, 2)
            .into_iter()
            .map(|entity| entity.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn zero_permits_are_clamped() {
        let scheduler = PrefetchScheduler::new(
            PrefetchOptions {
                max_concurrent: 0,
                ..PrefetchOptions::default()
            },
            Arc::new(NoopLoader),
        );
        assert_eq!(scheduler.capacity(), 1);
        assert_eq!(scheduler.available_permits(), 1);
    }

    #[test]
    fn report_accumulates() {
        let mut total = PrefetchReport::default();
        total += PrefetchReport {
            requested: 3,
            warmed: 2,
            failed: 1,
            ..PrefetchReport::default()
        };
        total += PrefetchReport {
            requested: 1,
            skipped: 1,
            ..PrefetchReport::default()
        };
        assert_eq!(total.requested, 4);
        assert_eq!(total.warmed + total.failed + total.skipped, 4);
    }
}
