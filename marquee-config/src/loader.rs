//! Layered loading for [`FetchLayerConfig`].
//!
//! Every source is read as a partial document and merged key by key on top
//! of the previous ones, so a layer only has to name the knobs it changes.
//! From lowest to highest precedence:
//!
//! 1. built-in defaults
//! 2. the user file `fetch.toml` / `fetch.json` under `$MARQUEE_CONFIG_DIR`,
//!    `$XDG_CONFIG_HOME/marquee` or `~/.config/marquee`
//! 3. the project file `marquee.toml` / `marquee.json` in the working
//!    directory
//! 4. the file named by `$MARQUEE_CONFIG_PATH`
//! 5. inline JSON from `$MARQUEE_CONFIG_JSON`
//! 6. single-knob `MARQUEE_*` variables (see [`ENV_OVERRIDES`])
//!
//! The merged document is validated before it is handed out.

use anyhow::{Context, bail};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    models::FetchLayerConfig,
    util::{non_empty_var, parse_bool_var, parse_num_var},
};

pub const CONFIG_PATH_VAR: &str = "MARQUEE_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "MARQUEE_CONFIG_JSON";
pub const CONFIG_DIR_VAR: &str = "MARQUEE_CONFIG_DIR";
pub const SKIP_DOTENV_VAR: &str = "MARQUEE_SKIP_DOTENV";

/// `(variable, section, knob)` for every single-knob override.
pub const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("MARQUEE_CACHE_CAPACITY", "cache", "capacity"),
    ("MARQUEE_CACHE_IDLE_TTL_MS", "cache", "idle_ttl_ms"),
    ("MARQUEE_QUERY_STALE_MS", "query", "stale_time_ms"),
    ("MARQUEE_QUERY_RETRY_COUNT", "query", "retry_count"),
    ("MARQUEE_QUERY_TIMEOUT_MS", "query", "request_timeout_ms"),
    ("MARQUEE_PREFETCH_PERMITS", "prefetch", "max_concurrent"),
    ("MARQUEE_PREFETCH_CRITICAL_ITEMS", "prefetch", "critical_max_items"),
    (
        "MARQUEE_PREFETCH_CONTINUE_ITEMS",
        "prefetch",
        "continue_watching_max_items",
    ),
    (
        "MARQUEE_PREFETCH_CONTINUE_PRIORITY",
        "prefetch",
        "continue_watching_priority",
    ),
];

/// One layer that contributed to a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    UserFile(PathBuf),
    ProjectFile(PathBuf),
    EnvPath(PathBuf),
    EnvInline,
    EnvVar(&'static str),
}

/// Merged configuration plus the layers it came from, lowest first.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: FetchLayerConfig,
    pub sources: Vec<ConfigSource>,
}

impl LoadedConfig {
    /// True when no layer was found and every knob is a built-in default.
    pub fn is_default(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Locations searched for configuration files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_dir: Option<PathBuf>,
    project_dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            user_dir: user_config_dir(),
            project_dir: PathBuf::from("."),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `fetch.toml`; `None` skips the user layer.
    pub fn user_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_dir = dir;
        self
    }

    /// Directory holding `marquee.toml`.
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn load(&self) -> anyhow::Result<LoadedConfig> {
        let mut merged = Value::Object(Map::new());
        let mut sources = Vec::new();

        if let Some(dir) = &self.user_dir
            && let Some(path) = first_existing(dir, "fetch")
        {
            merge_layer(&mut merged, read_layer(&path)?);
            sources.push(ConfigSource::UserFile(path));
        }

        if let Some(path) = first_existing(&self.project_dir, "marquee") {
            merge_layer(&mut merged, read_layer(&path)?);
            sources.push(ConfigSource::ProjectFile(path));
        }

        if let Some(raw) = non_empty_var(CONFIG_PATH_VAR) {
            let path = PathBuf::from(raw);
            merge_layer(&mut merged, read_layer(&path)?);
            sources.push(ConfigSource::EnvPath(path));
        }

        if let Some(raw) = non_empty_var(CONFIG_JSON_VAR) {
            let layer = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_VAR}"))?;
            merge_layer(&mut merged, expect_table(layer, CONFIG_JSON_VAR)?);
            sources.push(ConfigSource::EnvInline);
        }

        for &(var, section, knob) in ENV_OVERRIDES {
            if let Some(value) = parse_num_var::<u64>(var) {
                merge_layer(&mut merged, knob_layer(section, knob, value));
                sources.push(ConfigSource::EnvVar(var));
            }
        }

        let config: FetchLayerConfig =
            serde_json::from_value(merged).with_context(|| {
                format!("malformed configuration from {sources:?}")
            })?;
        config.validate().with_context(|| {
            format!("rejected configuration from {sources:?}")
        })?;

        log::debug!(
            "Loaded fetch layer configuration from {} layer(s): {:?}",
            sources.len(),
            sources
        );
        Ok(LoadedConfig { config, sources })
    }
}

impl FetchLayerConfig {
    /// Load `.env` (unless `$MARQUEE_SKIP_DOTENV` is set) and merge every
    /// layer found from the default locations.
    pub fn load_from_env() -> anyhow::Result<LoadedConfig> {
        if !parse_bool_var(SKIP_DOTENV_VAR).unwrap_or(false) {
            // A missing .env is the normal case.
            let _ = dotenvy::dotenv();
        }
        ConfigLoader::default().load()
    }
}

fn user_config_dir() -> Option<PathBuf> {
    if let Some(dir) = non_empty_var(CONFIG_DIR_VAR) {
        return Some(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty_var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("marquee"));
    }
    non_empty_var("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("marquee"))
}

/// `<dir>/<stem>.toml`, else `<dir>/<stem>.json`.
fn first_existing(dir: &Path, stem: &str) -> Option<PathBuf> {
    ["toml", "json"]
        .into_iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// Parse one file as a partial document. `.json` files are JSON, anything
/// else is TOML.
fn read_layer(path: &Path) -> anyhow::Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!("failed to read fetch config from {}", path.display())
    })?;
    let origin = path.display().to_string();

    let layer: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {origin}"))?,
        _ => toml::from_str(&contents)
            .with_context(|| format!("invalid TOML in {origin}"))?,
    };
    expect_table(layer, &origin)
}

fn expect_table(layer: Value, origin: &str) -> anyhow::Result<Value> {
    if !layer.is_object() {
        bail!("{origin} must contain a table of sections");
    }
    Ok(layer)
}

fn knob_layer(section: &str, knob: &str, value: u64) -> Value {
    let mut knobs = Map::new();
    knobs.insert(knob.to_owned(), Value::from(value));
    let mut root = Map::new();
    root.insert(section.to_owned(), Value::Object(knobs));
    Value::Object(root)
}

/// Tables merge recursively; any other value replaces what was there.
fn merge_layer(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                merge_layer(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, layer) => *base = layer,
    }
}
