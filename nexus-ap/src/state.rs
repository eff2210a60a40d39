//! Shared player state
//!
//! The supervisor is the only writer; HTTP handlers and SSE clients read.
//! The latest status snapshot is kept here so that late clients see the
//! current state without waiting for the next change.

use std::sync::RwLock;

use nexus_common::{NexusEvent, StatusUpdate};
use tokio::sync::broadcast;
use tracing::debug;

use crate::playback::SupervisorState;

/// Shared state accessible by all components
///
/// Locks are std locks: they are never held across an await.
pub struct SharedState {
    status: RwLock<StatusUpdate>,

    supervisor_state: RwLock<SupervisorState>,

    /// Event broadcaster for SSE events
    event_tx: broadcast::Sender<NexusEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            status: RwLock::new(StatusUpdate::off()),
            supervisor_state: RwLock::new(SupervisorState::Off),
            event_tx,
        }
    }

    /// Record a new status snapshot and broadcast it
    pub fn publish_status(&self, state: SupervisorState, status: StatusUpdate) {
        match self.supervisor_state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
        match self.status.write() {
            Ok(mut guard) => *guard = status.clone(),
            Err(poisoned) => *poisoned.into_inner() = status.clone(),
        }
        debug!(
            state = %state,
            status = %status.status,
            now_playing = status.now_playing.as_deref().unwrap_or(""),
            "Status published"
        );
        self.broadcast_event(NexusEvent::status(status));
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: NexusEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<NexusEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> StatusUpdate {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        match self.supervisor_state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
