//! Service configuration module.
//!
//! Handles loading, validating, and merging the service's TOML config file.
//! Stock defaults are overridden by whatever the user file specifies.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_dir = "qrcodes"    # Rendered files, cache manifest and history
//!
//! [cache]
//! ttl_hours = 24            # How long a committed render is served
//! persist = true            # Keep the cache manifest between runs
//!
//! [limits]
//! single_per_minute = 60    # Single generations per client per window
//! bulk_per_minute = 10      # Bulk generations per client per window
//! window_secs = 60          # Sliding window length
//!
//! [timeouts]
//! logo_fetch_ms = 5000      # Bound on fetching + decoding a logo
//! encode_ms = 10000         # Bound on final image encoding
//!
//! [history]
//! file = "history.jsonl"    # Relative to output_dir
//! max_listed = 50           # Records returned by `history`
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [limits]
//! single_per_minute = 600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory for rendered files, the cache manifest and history.
    pub output_dir: PathBuf,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutsConfig,
    pub history: HistoryConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("qrcodes"),
            cache: CacheConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            history: HistoryConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_hours must be at least 1".into(),
            ));
        }
        if self.limits.single_per_minute == 0 || self.limits.bulk_per_minute == 0 {
            return Err(ConfigError::Validation(
                "limits must allow at least one request per window".into(),
            ));
        }
        if self.limits.window_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.window_secs must be non-zero".into(),
            ));
        }
        if self.timeouts.logo_fetch_ms == 0 || self.timeouts.encode_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be non-zero".into(),
            ));
        }
        if self.history.file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "history.file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// History file, resolved against `output_dir` when relative.
    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history.file)
    }
}

/// Render cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Hours a committed render is served before it expires.
    pub ttl_hours: u32,
    /// Save the cache manifest to `output_dir` and reload it on startup.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: crate::cache::DEFAULT_TTL_HOURS as u32,
            persist: true,
        }
    }
}

/// Per-client rate limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub single_per_minute: u32,
    pub bulk_per_minute: u32,
    /// Length of the sliding window, in seconds.
    pub window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            single_per_minute: 60,
            bulk_per_minute: 10,
            window_secs: 60,
        }
    }
}

impl LimitsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Bounds on the I/O-bound pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub logo_fetch_ms: u64,
    pub encode_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            logo_fetch_ms: 5000,
            encode_ms: 10_000,
        }
    }
}

impl TimeoutsConfig {
    pub fn logo_fetch(&self) -> Duration {
        Duration::from_millis(self.logo_fetch_ms)
    }

    pub fn encode(&self) -> Duration {
        Duration::from_millis(self.encode_ms)
    }
}

/// Generation history settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// JSON Lines file, relative to `output_dir` unless absolute.
    pub file: PathBuf,
    /// Records returned when no limit is given.
    pub max_listed: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("history.jsonl"),
            max_listed: crate::history::DEFAULT_LISTED,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for bulk generation.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# styled-qr Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory for rendered files, the cache manifest and generation history.
output_dir = "qrcodes"

# ---------------------------------------------------------------------------
# Render cache
# ---------------------------------------------------------------------------
[cache]
# Hours an identical request is served from the cache.
ttl_hours = 24

# Save the cache manifest to output_dir and reload it on startup.
persist = true

# ---------------------------------------------------------------------------
# Rate limits (per client address, sliding window)
# ---------------------------------------------------------------------------
[limits]
single_per_minute = 60
bulk_per_minute = 10
window_secs = 60

# ---------------------------------------------------------------------------
# Timeouts for I/O-bound stages, in milliseconds
# ---------------------------------------------------------------------------
[timeouts]
logo_fetch_ms = 5000
encode_ms = 10000

# ---------------------------------------------------------------------------
# Generation history
# ---------------------------------------------------------------------------
[history]
# JSON Lines file, relative to output_dir unless absolute.
file = "history.jsonl"

# Records listed by `styled-qr history` when no --limit is given.
max_listed = 50

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for bulk generation.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
