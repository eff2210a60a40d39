//! Test helper modules for nexus-ap integration tests
//!
//! - FakeLauncher / FakeSession: in-memory engine sessions recording every
//!   command into a shared journal
//! - Harness: supervisor wired to a fake launcher and a temp settings file

#![allow(dead_code)]

pub mod fake_engine;

pub use fake_engine::{Call, FakeLauncher, FakeSession};

use std::sync::Arc;
use std::time::Duration;

use nexus_ap::config::SupervisorTiming;
use nexus_ap::playback::{Supervisor, SupervisorHandle, SupervisorState};
use nexus_ap::SharedState;
use nexus_common::{Catalog, NexusEvent, Settings, SettingsStore};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Harness {
    pub handle: SupervisorHandle,
    pub launcher: Arc<FakeLauncher>,
    pub events: broadcast::Receiver<NexusEvent>,
    pub task: JoinHandle<()>,
    _dir: TempDir,
}

impl Harness {
    /// Supervisor with default timing and the built-in catalog
    pub fn start(crossfade_seconds: f64) -> Self {
        Self::start_with(FakeLauncher::new(), crossfade_seconds)
    }

    pub fn start_with(launcher: FakeLauncher, crossfade_seconds: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        store
            .save(&Settings {
                crossfade_seconds,
                ..Settings::default()
            })
            .unwrap();

        let launcher = Arc::new(launcher);
        let shared = Arc::new(SharedState::new());
        let events = shared.subscribe_events();
        let (handle, task) = Supervisor::spawn(
            Arc::clone(&launcher),
            Catalog::builtin(),
            store,
            SupervisorTiming::default(),
            shared,
        );

        Self {
            handle,
            launcher,
            events,
            task,
            _dir: dir,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.handle.state()
    }

    /// Session started by the n-th launch (1-based)
    pub fn session(&self, n: usize) -> Arc<FakeSession> {
        self.launcher.session(n)
    }

    /// Everything broadcast since the last drain
    pub fn drain_events(&mut self) -> Vec<NexusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Texts of the status events broadcast since the last drain
    pub fn drain_status_texts(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                NexusEvent::StatusChanged { status, .. } => status.now_playing,
                _ => None,
            })
            .collect()
    }
}

/// Let spawned tasks run without moving the clock
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Advance the (paused) clock, letting timers fire on the way
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
