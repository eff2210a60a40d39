//! Error types for nexus-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Startup failures (`SpawnFailed`, `EngineUnreachable`) reject the selection
//! that caused them. `UnexpectedExit` never reaches a caller: it is routed
//! into the resurrection path by the supervisor.

use thiserror::Error;

/// Main error type for nexus-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Engine process could not be created at all
    #[error("Failed to spawn engine '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Control channel never came up within the retry budget
    #[error("Engine control channel unreachable after {attempts} attempts: {reason}")]
    EngineUnreachable { attempts: u32, reason: String },

    /// Engine died after reaching the live state
    #[error("Engine exited unexpectedly (code {code:?})")]
    UnexpectedExit { code: Option<i32> },

    /// Presentation layer asked for a source id the catalog does not know
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Supervisor task is no longer running
    #[error("Playback supervisor is not running")]
    SupervisorGone,

    /// Errors bubbled up from nexus-common
    #[error(transparent)]
    Common(#[from] nexus_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using nexus-ap Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the failure happened before a session became live
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, Error::SpawnFailed { .. } | Error::EngineUnreachable { .. })
    }
}
