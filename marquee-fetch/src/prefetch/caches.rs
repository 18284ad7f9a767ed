use dashmap::{DashMap, DashSet};
use marquee_model::{EntityId, ImageType, PreferenceKey, ResolveKey};

/// Resolved URLs keyed by the full request tuple.
///
/// The first URL stored for a key wins; later writes for the same key are
/// ignored so concurrent resolutions agree on one answer.
#[derive(Debug, Default)]
pub struct ResolvedUrlCache {
    urls: DashMap<ResolveKey, String>,
}

impl ResolvedUrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResolveKey) -> Option<String> {
        self.urls.get(key).map(|url| url.value().clone())
    }

    /// Store `url` unless the key already has one; returns the stored URL.
    pub fn insert(&self, key: ResolveKey, url: String) -> String {
        self.urls.entry(key).or_insert(url).value().clone()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn clear(&self) {
        self.urls.clear();
    }
}

/// Last image variant that resolved for a UI slot.
#[derive(Debug, Default)]
pub struct PreferenceCache {
    preferred: DashMap<PreferenceKey, ImageType>,
}

impl PreferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PreferenceKey) -> Option<ImageType> {
        self.preferred.get(key).map(|entry| *entry.value())
    }

    pub fn set(&self, key: PreferenceKey, image_type: ImageType) {
        self.preferred.insert(key, image_type);
    }

    pub fn len(&self) -> usize {
        self.preferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preferred.is_empty()
    }

    pub fn clear(&self) {
        self.preferred.clear();
    }
}

/// Entities already queued by one prefetch entry point.
#[derive(Debug, Default)]
pub struct EnqueueSet {
    queued: DashSet<EntityId>,
}

impl EnqueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as queued; `false` if it already was.
    pub fn try_mark(&self, id: &EntityId) -> bool {
        self.queued.insert(id.clone())
    }

    pub fn release(&self, id: &EntityId) {
        self.queued.remove(id);
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.queued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn clear(&self) {
        self.queued.clear();
    }
}
