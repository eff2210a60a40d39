//! # Nexus Radio Common Library
//!
//! Shared code for the Nexus Radio player and its presentation surfaces:
//! - Source catalog (id, display name, stream URL, theme)
//! - Event types (NexusEvent enum) for the status stream
//! - User settings file loading and persistence
//! - Error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;

pub use catalog::{Catalog, SourceDescriptor};
pub use config::{Settings, SettingsStore};
pub use error::{Error, Result};
pub use events::{NexusEvent, PlayerStatus, StatusUpdate};
