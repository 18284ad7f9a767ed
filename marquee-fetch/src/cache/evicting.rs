use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use marquee_config::CacheSettings;
use tokio::time::Instant;

use super::entry::{CacheEntry, EntryMeta};
use crate::constants::{CACHE_CAPACITY, CACHE_IDLE_TTL, CACHE_SWEEP_INTERVAL};
use crate::time::{Clock, system_clock};

/// Capacity and idle-sweep policy for [`EvictingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub capacity: usize,
    /// Entries not read for longer than this are dropped by the sweep.
    pub idle_ttl: Duration,
    /// The sweep runs at most once per interval, inline on `get`/`put`.
    pub sweep_interval: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            capacity: CACHE_CAPACITY,
            idle_ttl: CACHE_IDLE_TTL,
            sweep_interval: CACHE_SWEEP_INTERVAL,
        }
    }
}

impl EvictionPolicy {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

impl From<&CacheSettings> for EvictionPolicy {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            capacity: settings.capacity.max(1),
            idle_ttl: settings.idle_ttl(),
            sweep_interval: settings.sweep_interval(),
        }
    }
}

/// Counters for cache behaviour since construction (or the last `clear`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for a new key.
    pub evictions: u64,
    /// Entries dropped by the idle sweep.
    pub expirations: u64,
    pub sweeps: u64,
}

/// Key/value store with a hard capacity bound and least-recently-used
/// eviction.
///
/// There is no background timer: idle entries are swept inline by the first
/// `get`/`put` after `sweep_interval` has elapsed. The cache has no internal
/// locking; owners that share it wrap it in a mutex.
pub struct EvictingCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    policy: EvictionPolicy,
    last_sweep: Instant,
    next_seq: u64,
    stats: CacheStats,
    clock: Arc<dyn Clock>,
}

impl<K, V> fmt::Debug for EvictingCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvictingCache")
            .field("len", &self.entries.len())
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K, V> Default for EvictingCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

impl<K, V> EvictingCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(policy: EvictionPolicy) -> Self {
        Self::with_clock(policy, system_clock())
    }

    pub fn with_clock(policy: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = clock.now();
        Self {
            entries: HashMap::with_capacity(policy.capacity),
            policy: EvictionPolicy {
                capacity: policy.capacity.max(1),
                ..policy
            },
            last_sweep,
            next_seq: 0,
            stats: CacheStats::default(),
            clock,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Return the stored value and mark it as recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        self.maybe_sweep(now);
        let seq = self.bump_seq();

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now, seq);
                self.stats.hits += 1;
                Some(&entry.data)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite `key`. A new key arriving at capacity first evicts
    /// the least recently accessed entry.
    pub fn put(&mut self, key: K, value: V) {
        let now = self.clock.now();
        self.maybe_sweep(now);

        if !self.entries.contains_key(&key)
            && self.entries.len() >= self.policy.capacity
        {
            self.evict_lru();
        }

        let seq = self.bump_seq();
        self.entries.insert(key, CacheEntry::new(value, now, seq));
    }

    pub fn invalidate<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.data)
    }

    /// True when `key` is absent or was written more than `stale_time` ago.
    pub fn is_stale<Q>(&self, key: &Q, stale_time: Duration) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.get(key) {
            Some(entry) => {
                self.clock.now().duration_since(entry.created_at) > stale_time
            }
            None => true,
        }
    }

    /// Membership test that does not count as an access.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn entry_meta<Q>(&self, key: &Q) -> Option<EntryMeta>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(CacheEntry::meta)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
        self.last_sweep = self.clock.now();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Run the idle sweep now, regardless of when it last ran.
    pub fn sweep_now(&mut self) -> usize {
        let now = self.clock.now();
        self.sweep(now)
    }

    fn maybe_sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < self.policy.sweep_interval {
            return;
        }
        self.sweep(now);
    }

    fn sweep(&mut self, now: Instant) -> usize {
        self.last_sweep = now;
        self.stats.sweeps += 1;

        let idle_ttl = self.policy.idle_ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            now.duration_since(entry.last_accessed_at) <= idle_ttl
        });
        let removed = before - self.entries.len();

        if removed > 0 {
            self.stats.expirations += removed as u64;
            log::debug!(
                "Cache sweep dropped {} idle entries ({} remain)",
                removed,
                self.entries.len()
            );
        }
        removed
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_accessed_at, entry.access_seq))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            log::trace!(
                "Cache at capacity ({}), evicted least recently used entry",
                self.policy.capacity
            );
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

impl<K, V> EvictingCache<K, V>
where
    K: Eq + Hash + Clone + AsRef<str>,
{
    /// Drop every key containing `pattern`; returns how many were removed.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.as_ref().contains(pattern));
        before - self.entries.len()
    }
}
