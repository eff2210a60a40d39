//! Engine control channel wire protocol
//!
//! JSON records, one per line, in both directions.
//!
//! Outbound:
//! ```text
//! {"command":["observe_property",1,"media-title"]}
//! {"command":["set_property","volume",42.5]}
//! {"command":["cycle","pause"]}
//! ```
//!
//! Inbound (everything else, including command replies, is ignored):
//! ```text
//! {"event":"property-change","id":2,"name":"time-pos","data":12.48}
//! ```
//!
//! The decoder is tolerant: partial reads are buffered until a newline
//! arrives, and lines that fail to parse are dropped.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{trace, warn};

use crate::playback::events::EngineEvent;

/// Placeholder the engine reports when a stream carries no metadata
pub const NO_METADATA_PLACEHOLDER: &str = "-";

/// Longest line kept while waiting for a newline
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Engine properties observed by every session, with their observer ids
pub const OBSERVED_PROPERTIES: [(u64, &str); 4] = [
    (1, "media-title"),
    (2, "time-pos"),
    (3, "pause"),
    (4, "paused-for-cache"),
];

/// Outbound command
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    ObserveProperty { id: u64, name: &'static str },
    SetProperty { name: &'static str, value: Value },
    Cycle { name: &'static str },
}

impl EngineCommand {
    pub fn set_volume(level: f64) -> Self {
        EngineCommand::SetProperty {
            name: "volume",
            value: json!(level),
        }
    }

    pub fn toggle_pause() -> Self {
        EngineCommand::Cycle { name: "pause" }
    }

    /// Observation commands sent right after the channel comes up
    pub fn observe_all() -> Vec<Self> {
        OBSERVED_PROPERTIES
            .iter()
            .map(|&(id, name)| EngineCommand::ObserveProperty { id, name })
            .collect()
    }

    /// Serialize as one newline-terminated record
    pub fn encode(&self) -> String {
        let record = match self {
            EngineCommand::ObserveProperty { id, name } => {
                json!({ "command": ["observe_property", id, name] })
            }
            EngineCommand::SetProperty { name, value } => {
                json!({ "command": ["set_property", name, value] })
            }
            EngineCommand::Cycle { name } => json!({ "command": ["cycle", name] }),
        };
        let mut line = record.to_string();
        line.push('\n');
        line
    }
}

/// Inbound record, loosely typed
#[derive(Debug, Deserialize)]
struct InboundRecord {
    event: Option<String>,
    name: Option<String>,
    #[serde(default)]
    data: Value,
}

/// A decoded property change
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub name: String,
    pub data: Value,
}

impl PropertyChange {
    /// Map to a session event; None for properties or values we do not act on
    pub fn into_event(self) -> Option<EngineEvent> {
        match self.name.as_str() {
            "media-title" => clean_title(&self.data).map(EngineEvent::TitleChanged),
            "time-pos" if !self.data.is_null() => Some(EngineEvent::Heartbeat),
            "pause" => self.data.as_bool().map(EngineEvent::PauseChanged),
            "paused-for-cache" => self.data.as_bool().map(EngineEvent::BufferingChanged),
            _ => None,
        }
    }
}

/// Title text worth showing, if any
fn clean_title(data: &Value) -> Option<String> {
    let title = data.as_str()?.trim();
    if title.is_empty() || title == NO_METADATA_PLACEHOLDER {
        None
    } else {
        Some(title.to_string())
    }
}

/// Parse one line. Malformed lines and non property-change records yield None.
pub fn parse_line(line: &str) -> Option<PropertyChange> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let record: InboundRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            trace!("Dropping malformed engine line: {}", e);
            return None;
        }
    };
    if record.event.as_deref() != Some("property-change") {
        return None;
    }
    Some(PropertyChange {
        name: record.name?,
        data: record.data,
    })
}

/// Splits a byte stream into lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them (without terminator)
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            warn!(
                "Engine line exceeded {} bytes without a newline, discarding",
                MAX_LINE_BYTES
            );
            self.buffer.clear();
        }

        lines
    }

    /// Bytes waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed bytes and decode them straight into session events
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<EngineEvent> {
        self.push(bytes)
            .iter()
            .filter_map(|line| parse_line(line))
            .filter_map(PropertyChange::into_event)
            .collect()
    }
}
