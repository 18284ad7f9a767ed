use tokio::time::Instant;

/// A stored value plus the bookkeeping the eviction policy needs.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub(crate) data: V,
    pub(crate) created_at: Instant,
    pub(crate) access_count: u64,
    pub(crate) last_accessed_at: Instant,
    // Monotonic tie-breaker for entries touched within the same clock tick.
    pub(crate) access_seq: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(data: V, now: Instant, seq: u64) -> Self {
        Self {
            data,
            created_at: now,
            access_count: 0,
            last_accessed_at: now,
            access_seq: seq,
        }
    }

    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
        self.access_seq = seq;
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
        }
    }
}

/// Read-only view of an entry's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub created_at: Instant,
    pub access_count: u64,
    pub last_accessed_at: Instant,
}
