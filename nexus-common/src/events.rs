//! Event types for the Nexus Radio event stream
//!
//! Events are broadcast by the player and serialized for SSE transmission to
//! whatever presentation surface is attached.

use serde::{Deserialize, Serialize};

use crate::catalog::SourceDescriptor;

/// Player status as shown by the panel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Nothing selected, no engine running
    Off,
    /// Engine starting, switching, or reconnecting
    Loading,
    Playing,
    Paused,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Off => write!(f, "off"),
            PlayerStatus::Loading => write!(f, "loading"),
            PlayerStatus::Playing => write!(f, "playing"),
            PlayerStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Snapshot of what the panel should display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: PlayerStatus,
    /// Id of the intended source (None when off)
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    /// Track title or transient status line ("Buffering...", "Reconnecting...")
    pub now_playing: Option<String>,
    pub theme_gradient: Option<String>,
}

impl StatusUpdate {
    /// Status for a deliberately stopped player
    pub fn off() -> Self {
        Self {
            status: PlayerStatus::Off,
            source_id: None,
            source_name: None,
            now_playing: None,
            theme_gradient: None,
        }
    }

    /// Status tied to a source
    pub fn for_source(
        status: PlayerStatus,
        source: &SourceDescriptor,
        now_playing: impl Into<String>,
    ) -> Self {
        Self {
            status,
            source_id: Some(source.id.clone()),
            source_name: Some(source.display_name.clone()),
            now_playing: Some(now_playing.into()),
            theme_gradient: Some(source.theme_gradient.clone()),
        }
    }
}

impl Default for StatusUpdate {
    fn default() -> Self {
        Self::off()
    }
}

/// Nexus Radio event types
///
/// Shared by the player and any panel that consumes the SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NexusEvent {
    /// Player status changed
    ///
    /// Emitted on every supervisor-visible state change: selection, switch,
    /// pause/resume, title change, recovery, stop.
    StatusChanged {
        #[serde(flatten)]
        status: StatusUpdate,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user-visible failure (startup failure, unknown source)
    Error {
        message: String,
        source_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl NexusEvent {
    pub fn status(status: StatusUpdate) -> Self {
        NexusEvent::StatusChanged {
            status,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>, source_id: Option<String>) -> Self {
        NexusEvent::Error {
            message: message.into(),
            source_id,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            NexusEvent::StatusChanged { .. } => "StatusChanged",
            NexusEvent::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PlayerStatus::Loading).unwrap();
        assert_eq!(json, "\"loading\"");
        assert_eq!(PlayerStatus::Paused.to_string(), "paused");
    }

    #[test]
    fn test_status_changed_is_flat_and_tagged() {
        let source = SourceDescriptor::new("rekt", "Rekt FM", "http://x", "linear-gradient(red, blue)");
        let event = NexusEvent::status(StatusUpdate::for_source(
            PlayerStatus::Playing,
            &source,
            "Artist - Track",
        ));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "StatusChanged");
        assert_eq!(value["status"], "playing");
        assert_eq!(value["source_name"], "Rekt FM");
        assert_eq!(value["now_playing"], "Artist - Track");
        assert_eq!(value["theme_gradient"], "linear-gradient(red, blue)");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_off_status_has_no_source() {
        let off = StatusUpdate::off();
        assert_eq!(off.status, PlayerStatus::Off);
        assert!(off.source_id.is_none());
        assert!(off.source_name.is_none());
    }

    #[test]
    fn test_error_event_type() {
        let event = NexusEvent::error("engine missing", Some("ebsm".into()));
        assert_eq!(event.event_type(), "Error");
    }
}
