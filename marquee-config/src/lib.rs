//! Configuration for the Marquee fetch layer.
//!
//! A single [`FetchLayerConfig`] carries defaults for the session cache, the
//! query store and the prefetch scheduler. [`ConfigLoader`] merges partial
//! layers on top of the built-in defaults: a per-user `fetch.toml`, a
//! project `marquee.toml`, `$MARQUEE_CONFIG_PATH`, `$MARQUEE_CONFIG_JSON`
//! and finally single-knob environment overrides.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoader, ConfigSource, LoadedConfig};
pub use models::{
    CacheSettings, FetchLayerConfig, PrefetchSettings, QuerySettings,
};
pub use validation::ConfigGuardRailError;
