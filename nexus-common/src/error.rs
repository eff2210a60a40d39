//! Common error types for Nexus Radio

use thiserror::Error;

/// Common result type for Nexus Radio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Nexus Radio crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("Settings parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Settings could not be serialized
    #[error("Settings write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
