//! Playback supervision: sessions, watchdog, crossfade, resurrection

pub mod crossfade;
pub mod events;
pub mod recovery;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod watchdog;

pub use crossfade::{CrossfadeHandle, CrossfadePlan};
pub use events::{EngineEvent, SessionEvent, SessionId};
pub use recovery::{BackoffPolicy, ResurrectionTimer};
pub use session::{EngineLauncher, PlaybackSession};
pub use state::SupervisorState;
pub use supervisor::{Supervisor, SupervisorCommand, SupervisorHandle};
pub use watchdog::{Watchdog, WatchdogTolerance};
