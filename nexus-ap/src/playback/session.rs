//! Session abstraction
//!
//! The supervisor and the crossfade driver only talk to engine sessions
//! through [`PlaybackSession`], and only create them through
//! [`EngineLauncher`]. The production implementation is
//! `crate::engine::MpvLauncher`; tests plug in in-memory fakes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::playback::events::{SessionEvent, SessionId};

/// Commands accepted by a running engine session
///
/// All commands are fire-and-forget. Sending to a session that is no longer
/// live is a no-op, never an error.
pub trait PlaybackSession: Send + Sync + 'static {
    fn id(&self) -> SessionId;

    /// True from channel handshake until stop or detected exit
    fn is_live(&self) -> bool;

    /// Last starvation flag reported by the engine
    fn is_buffering(&self) -> bool;

    /// Set output level (0-100)
    fn set_volume(&self, level: f64);

    fn toggle_pause(&self);

    /// Close the channel and terminate the process tree. Idempotent.
    fn stop(&self);
}

/// Factory for live sessions
pub trait EngineLauncher: Send + Sync + 'static {
    type Session: PlaybackSession;

    /// Spawn an engine for `stream_url` and wait until its control channel is up.
    ///
    /// Events observed by the session are sent to `events` tagged with `id`.
    /// On failure nothing is left running.
    fn launch(
        &self,
        id: SessionId,
        stream_url: String,
        initial_volume: f64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> impl Future<Output = Result<Arc<Self::Session>>> + Send;
}
