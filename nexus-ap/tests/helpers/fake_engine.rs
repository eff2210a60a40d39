//! In-memory engine sessions

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nexus_ap::playback::{EngineEvent, EngineLauncher, PlaybackSession, SessionEvent, SessionId};
use nexus_ap::{Error, Result};
use tokio::sync::mpsc;

/// Everything the supervisor asked of the engines, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Launch { session: u64, url: String },
    Volume { session: u64, level: f64 },
    TogglePause { session: u64 },
    Stop { session: u64 },
}

type Journal = Arc<Mutex<Vec<Call>>>;

pub struct FakeSession {
    id: SessionId,
    url: String,
    live: AtomicBool,
    buffering: AtomicBool,
    paused: AtomicBool,
    stopped: AtomicBool,
    journal: Journal,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl FakeSession {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn raw_id(&self) -> u64 {
        self.id.raw()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Report an event as if the engine had sent it
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(SessionEvent::new(self.id, event));
    }

    pub fn heartbeat(&self) {
        self.emit(EngineEvent::Heartbeat);
    }

    pub fn title(&self, title: &str) {
        self.emit(EngineEvent::TitleChanged(title.to_string()));
    }

    pub fn set_buffering(&self, buffering: bool) {
        self.buffering.store(buffering, Ordering::SeqCst);
        self.emit(EngineEvent::BufferingChanged(buffering));
    }

    /// Process exits on its own
    pub fn crash(&self, code: i32) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.emit(EngineEvent::UnexpectedExit { code: Some(code) });
        }
    }

    /// Volume levels commanded to this session, in order
    pub fn volumes(&self) -> Vec<f64> {
        volumes_for(&self.journal.lock().unwrap(), self.id.raw())
    }
}

impl PlaybackSession for FakeSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn is_buffering(&self) -> bool {
        self.buffering.load(Ordering::SeqCst)
    }

    fn set_volume(&self, level: f64) {
        if self.is_live() {
            self.journal.lock().unwrap().push(Call::Volume {
                session: self.id.raw(),
                level,
            });
        }
    }

    fn toggle_pause(&self) {
        if !self.is_live() {
            return;
        }
        self.journal.lock().unwrap().push(Call::TogglePause {
            session: self.id.raw(),
        });
        // The engine echoes its new pause flag
        let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
        self.emit(EngineEvent::PauseChanged(paused));
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.live.store(false, Ordering::SeqCst);
        self.journal.lock().unwrap().push(Call::Stop {
            session: self.id.raw(),
        });
    }
}

/// Volume levels for one session out of a journal slice
pub fn volumes_for(calls: &[Call], session: u64) -> Vec<f64> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Volume { session: s, level } if *s == session => Some(*level),
            _ => None,
        })
        .collect()
}

#[derive(Default)]
pub struct FakeLauncher {
    journal: Journal,
    sessions: Arc<Mutex<Vec<Arc<FakeSession>>>>,
    failures: Mutex<VecDeque<String>>,
    before_ready: Mutex<Vec<EngineEvent>>,
    delay: Duration,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch takes this long before reporting
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Make the next launch fail as unreachable
    pub fn fail_next(&self, reason: &str) {
        self.failures.lock().unwrap().push_back(reason.to_string());
    }

    /// Every launch reports these events before it returns its session,
    /// the way a real engine answers the initial property observations
    pub fn emit_before_ready(&self, event: EngineEvent) {
        self.before_ready.lock().unwrap().push(event);
    }

    pub fn launch_count(&self) -> usize {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, Call::Launch { .. }))
            .count()
    }

    /// Session created by the n-th successful launch (1-based)
    pub fn session(&self, n: usize) -> Arc<FakeSession> {
        Arc::clone(&self.sessions.lock().unwrap()[n - 1])
    }

    /// Sessions created so far, in completion order
    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn journal(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }
}

impl EngineLauncher for FakeLauncher {
    type Session = FakeSession;

    fn launch(
        &self,
        id: SessionId,
        stream_url: String,
        _initial_volume: f64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> impl Future<Output = Result<Arc<FakeSession>>> + Send {
        let journal = Arc::clone(&self.journal);
        let sessions = Arc::clone(&self.sessions);
        let failure = self.failures.lock().unwrap().pop_front();
        let before_ready = self.before_ready.lock().unwrap().clone();
        let delay = self.delay;

        async move {
            journal.lock().unwrap().push(Call::Launch {
                session: id.raw(),
                url: stream_url.clone(),
            });
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = failure {
                return Err(Error::EngineUnreachable {
                    attempts: 10,
                    reason,
                });
            }

            let session = Arc::new(FakeSession {
                id,
                url: stream_url,
                live: AtomicBool::new(true),
                buffering: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                journal,
                events,
            });
            sessions.lock().unwrap().push(Arc::clone(&session));
            for event in before_ready {
                session.emit(event);
            }
            // Give the supervisor a chance to see the events first
            tokio::task::yield_now().await;
            Ok(session)
        }
    }
}
