//! nexus-ap runtime configuration
//!
//! Tuning constants for the engine controller and the supervisor, plus the
//! engine command resolution. Values that users may change live in the
//! settings file (`nexus_common::config::Settings`); everything here has a
//! built-in default and is only overridden by tests.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nexus_common::Settings;
use tracing::{debug, warn};

use crate::playback::crossfade::TICK_PERIOD;
use crate::playback::recovery::BackoffPolicy;
use crate::playback::watchdog::WatchdogTolerance;

/// Default engine command when nothing better is found
pub const DEFAULT_ENGINE_COMMAND: &str = "mpv";

/// Control channel connection retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(200),
        }
    }
}

/// How engine processes are spawned
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Absolute path or bare command name
    pub command: PathBuf,
    pub connect: ConnectPolicy,
}

impl EngineConfig {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            connect: ConnectPolicy::default(),
        }
    }
}

/// Timers used by the supervisor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisorTiming {
    /// Crossfade ramp tick
    pub crossfade_tick: Duration,
    pub watchdog: WatchdogTolerance,
    /// Watchdog tolerance from going live until the first heartbeat
    pub startup_grace: Duration,
    /// Resurrection delay policy
    pub recovery: BackoffPolicy,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            crossfade_tick: TICK_PERIOD,
            watchdog: WatchdogTolerance::default(),
            startup_grace: Duration::from_secs(30),
            recovery: BackoffPolicy::default(),
        }
    }
}

impl SupervisorTiming {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            recovery: BackoffPolicy::from(&settings.recovery),
            ..Self::default()
        }
    }
}

/// Resolves which engine binary to spawn
///
/// An absolute path and a bare command name are treated the same way: the
/// value is handed to the OS, which searches `PATH` for bare names. The
/// locator only picks *which* value to hand over.
#[derive(Debug, Clone, Default)]
pub struct EngineLocator {
    explicit: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl EngineLocator {
    /// Locator searching the process `PATH`
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Locator searching a custom `PATH`-style list
    pub fn with_search_path(explicit: Option<PathBuf>, search_path: impl Into<OsString>) -> Self {
        Self {
            explicit,
            search_path: Some(search_path.into()),
        }
    }

    /// Platform candidates in preference order
    pub fn candidates() -> &'static [&'static str] {
        if cfg!(windows) {
            &["mpv.com", "mpv.exe", "mpv"]
        } else {
            &["mpv"]
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(explicit) = &self.explicit {
            if is_bare_name(explicit) {
                if let Some(found) = self.find_on_path(explicit) {
                    debug!("Engine '{}' found at {}", explicit.display(), found.display());
                    return found;
                }
                // Let the OS try; a miss becomes SpawnFailed on first use
                return explicit.clone();
            }
            if explicit.is_file() {
                return explicit.clone();
            }
            warn!(
                "Configured engine {} does not exist, falling back to PATH",
                explicit.display()
            );
        }

        for candidate in Self::candidates() {
            if let Some(found) = self.find_on_path(Path::new(candidate)) {
                debug!("Engine found at {}", found.display());
                return found;
            }
        }

        PathBuf::from(DEFAULT_ENGINE_COMMAND)
    }

    fn find_on_path(&self, name: &Path) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

fn is_bare_name(path: &Path) -> bool {
    path.components().count() == 1 && !path.is_absolute()
}
