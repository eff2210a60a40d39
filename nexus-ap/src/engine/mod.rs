//! External playback engine: process control and wire protocol

pub mod controller;
pub mod endpoint;
pub mod process;
pub mod protocol;

pub use controller::{EngineSession, MpvLauncher};
pub use endpoint::IpcEndpoint;
pub use protocol::{EngineCommand, LineDecoder};
