//! Supervisor state machine states

use std::fmt;

use nexus_common::PlayerStatus;
use serde::{Deserialize, Serialize};

/// Where the supervisor is in its lifecycle
///
/// ```text
///   Off ──select──► Tuning ──launch ok──► Live ◄──pause──► Paused
///                     ▲                     │
///                     │                     │ watchdog / exit
///                     └──resurrection── Recovering
///
///   stop (any state) or launch failure ──► Off
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// No intended source, no engine
    #[default]
    Off,
    /// Engine for the intended source is being started
    Tuning,
    /// Current session is playing
    Live,
    /// Current session paused by the user
    Paused,
    /// Current session died; a resurrection is pending
    Recovering,
}

impl SupervisorState {
    /// Status reported to the presentation surface
    pub fn player_status(self) -> PlayerStatus {
        match self {
            SupervisorState::Off => PlayerStatus::Off,
            SupervisorState::Tuning | SupervisorState::Recovering => PlayerStatus::Loading,
            SupervisorState::Live => PlayerStatus::Playing,
            SupervisorState::Paused => PlayerStatus::Paused,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Off => write!(f, "Off"),
            SupervisorState::Tuning => write!(f, "Tuning"),
            SupervisorState::Live => write!(f, "Live"),
            SupervisorState::Paused => write!(f, "Paused"),
            SupervisorState::Recovering => write!(f, "Recovering"),
        }
    }
}
