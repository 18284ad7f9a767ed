//! Common imports for code driving the fetch layer.

pub use crate::cache::{EvictingCache, EvictionPolicy};
pub use crate::error::{ErrorKind, FetchError};
pub use crate::prefetch::{
    AssetLoader, ImageResolver, NoopLoader, PrefetchOptions, PrefetchReport,
    PrefetchScheduler,
};
pub use crate::query::{
    QueryConfig, QueryKey, QueryObserver, QueryState, QueryStatus, QueryStore,
    StoreOptions,
};
pub use crate::session::{SessionManager, SessionScope};
pub use crate::time::{Clock, ManualClock, TokioClock};

pub use marquee_model::prelude::*;
pub use tokio_util::sync::CancellationToken;
