//! Image URL prefetch.
//!
//! [`PrefetchScheduler`] resolves artwork URLs for batches of entities through
//! a caller-supplied [`ImageResolver`], memoizes them and hands them to an
//! [`AssetLoader`] for warm-up. Resolver work is bounded by one semaphore
//! shared by every entry point.

pub mod caches;
pub mod scheduler;
pub mod traits;

pub use caches::{EnqueueSet, PreferenceCache, ResolvedUrlCache};
pub use scheduler::{PrefetchOptions, PrefetchReport, PrefetchScheduler};
pub use traits::{AssetLoader, ImageResolver, NoopLoader};
