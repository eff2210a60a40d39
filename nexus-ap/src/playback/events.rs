//! Internal session events (not exposed via SSE)
//!
//! Engine sessions report what their engine observed through one tagged
//! event stream. Every event carries the id of the session that produced it;
//! the supervisor consumes the stream at a single point and drops anything
//! that does not come from the current session.
//!
//! For the events visible to clients, see `nexus_common::events::NexusEvent`.

use std::fmt;

/// Identity of one engine session
///
/// Allocated by the supervisor from a monotonically increasing counter, so an
/// id is never reused within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// The id that follows this one
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Facts reported by an engine session
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Media title changed (already filtered: never empty, never the placeholder)
    TitleChanged(String),

    /// Playback position advanced
    ///
    /// Any position update counts, regardless of value: it proves the decode
    /// pipeline is moving.
    Heartbeat,

    /// Engine pause flag changed
    PauseChanged(bool),

    /// Engine starvation flag changed (true = waiting for network data)
    BufferingChanged(bool),

    /// Process exited while the session was still live
    UnexpectedExit { code: Option<i32> },
}

/// An engine event tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: EngineEvent,
}

impl SessionEvent {
    pub fn new(session: SessionId, event: EngineEvent) -> Self {
        Self { session, event }
    }
}
