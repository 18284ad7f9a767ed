//! Bounded in-memory cache used by the session scope.

pub mod entry;
pub mod evicting;

pub use entry::{CacheEntry, EntryMeta};
pub use evicting::{CacheStats, EvictingCache, EvictionPolicy};
