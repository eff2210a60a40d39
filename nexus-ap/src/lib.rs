//! # Nexus Radio Audio Player Library (nexus-ap)
//!
//! Supervises an external playback engine (mpv-compatible) for internet
//! radio streams.
//!
//! **Purpose:** Keep one engine session playing the selected source, switch
//! sources with a dual-session volume crossfade, detect silent failure with
//! an adaptive heartbeat watchdog, and resurrect dead sessions.
//!
//! **Architecture:** One supervisor task owns all playback state; engine
//! sessions report through a tagged event stream; an HTTP/SSE API is the
//! presentation surface.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
