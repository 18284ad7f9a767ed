//! Key-addressed async queries.
//!
//! [`QueryStore`] owns one [`QueryState`] per key and guarantees at most one
//! in-flight fetch per key, staleness-gated refetching and retry with linear
//! backoff. [`QueryObserver`] is the polling bridge UI code reads through.

pub mod config;
pub mod key;
pub mod observer;
pub mod retry;
pub mod state;
pub mod store;

pub use config::QueryConfig;
pub use key::QueryKey;
pub use observer::{QueryObserver, observe_stream};
pub use retry::{AttemptOutcome, should_retry};
pub use state::{QueryState, QueryStatus};
pub use store::{QueryStore, StoreOptions};
