//! User settings and settings file resolution
//!
//! Settings live in a single user-scoped TOML file. Resolution order:
//! 1. Explicit path (command-line argument)
//! 2. `NEXUS_SETTINGS` environment variable
//! 3. `<config_dir>/nexus-radio/settings.toml`
//!
//! A missing file is not an error: every field has a built-in default and
//! the file is created on first write.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SourceDescriptor};
use crate::{Error, Result};

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV_VAR: &str = "NEXUS_SETTINGS";

/// Crossfade duration bounds (seconds)
pub const MIN_CROSSFADE_SECONDS: f64 = 0.5;
pub const MAX_CROSSFADE_SECONDS: f64 = 5.0;
pub const DEFAULT_CROSSFADE_SECONDS: f64 = 1.5;

/// Settings persisted in the user's settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Crossfade duration used when switching sources
    #[serde(default = "default_crossfade_seconds")]
    pub crossfade_seconds: f64,

    /// Engine command (absolute path or bare name on PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Catalog override; the built-in stations are used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDescriptor>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Resurrection back-off parameters
///
/// The delay before attempt `n` (0-indexed, counting consecutive failures of
/// the same source) is `first_ms × factor^n`, capped at `max_ms`. A factor of
/// 1.0 keeps the delay fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_first_delay_ms")]
    pub first_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_crossfade_seconds() -> f64 {
    DEFAULT_CROSSFADE_SECONDS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_first_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crossfade_seconds: DEFAULT_CROSSFADE_SECONDS,
            engine: None,
            sources: Vec::new(),
            logging: LoggingConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: default_first_delay_ms(),
            factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Settings {
    /// Crossfade duration clamped to the supported range.
    ///
    /// Hand-edited files may contain anything; NaN falls back to the default.
    pub fn crossfade_seconds(&self) -> f64 {
        clamp_crossfade(self.crossfade_seconds)
    }

    /// Catalog to serve: the `[[sources]]` override, or the built-in list
    pub fn catalog(&self) -> Result<Catalog> {
        if self.sources.is_empty() {
            Ok(Catalog::builtin())
        } else {
            Catalog::new(self.sources.clone())
        }
    }
}

/// Clamp a crossfade duration into [0.5, 5] seconds
pub fn clamp_crossfade(seconds: f64) -> f64 {
    if seconds.is_nan() {
        return DEFAULT_CROSSFADE_SECONDS;
    }
    seconds.clamp(MIN_CROSSFADE_SECONDS, MAX_CROSSFADE_SECONDS)
}

/// Validate a crossfade duration coming from the user
pub fn validate_crossfade(seconds: f64) -> Result<f64> {
    if !seconds.is_finite() || !(MIN_CROSSFADE_SECONDS..=MAX_CROSSFADE_SECONDS).contains(&seconds) {
        return Err(Error::InvalidInput(format!(
            "crossfade must be between {} and {} seconds (got {})",
            MIN_CROSSFADE_SECONDS, MAX_CROSSFADE_SECONDS, seconds
        )));
    }
    Ok(seconds)
}

/// Resolve the settings file path
///
/// Priority: explicit path > `NEXUS_SETTINGS` > platform config directory.
pub fn resolve_settings_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(SETTINGS_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_settings_path()
}

/// OS-dependent default settings location
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("nexus-radio").join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("./nexus-radio-settings.toml"))
}

/// File-backed settings store
///
/// Every `load()` re-reads the file so external edits and writes made by
/// other handles are picked up immediately.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file {:?}: {}", self.path, e);
                Settings::default()
            }
        }
    }

    /// Strict variant of [`SettingsStore::load`]; a missing file still yields defaults.
    pub fn try_load(&self) -> Result<Settings> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {:?} not found, using defaults", self.path);
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&content)?)
    }

    /// Write settings (temp file + rename so readers never see half a file)
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Persist a new crossfade duration
    pub fn set_crossfade_seconds(&self, seconds: f64) -> Result<()> {
        let seconds = validate_crossfade(seconds)?;
        let mut settings = self.try_load()?;
        settings.crossfade_seconds = seconds;
        self.save(&settings)?;
        info!("Crossfade duration set to {:.1}s", seconds);
        Ok(())
    }
}
