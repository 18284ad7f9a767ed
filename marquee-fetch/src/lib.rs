//! Marquee fetch orchestration
//!
//! Client-side plumbing that sits between the browsing UI and the catalog
//! service:
//!
//! - [`cache::EvictingCache`]: bounded LRU store with a lazy idle sweep.
//! - [`query::QueryStore`]: key-addressed async queries with staleness,
//!   in-flight dedup and retry with linear backoff.
//! - [`prefetch::PrefetchScheduler`]: semaphore-bounded image URL resolution
//!   and warm-up with per-slot variant preference learning.
//! - [`session`]: ties the session-scoped pieces to the active identity.
//!
//! The fetcher, image resolver and asset loader are supplied by the caller;
//! this crate never talks to the network itself.

pub mod cache;
pub mod constants;
pub mod error;
pub mod logging;
pub mod prefetch;
pub mod prelude;
pub mod query;
pub mod session;
pub mod time;

pub use error::{ErrorKind, FetchError};
