//! Playback session supervisor
//!
//! Single owner of all playback state. Runs as one task that consumes:
//! - user commands from [`SupervisorHandle`]
//! - launch results from the tasks that start engine sessions
//! - the tagged session event stream
//! - the watchdog and resurrection deadlines
//!
//! Nothing else mutates supervisor state, so transitions never race. Launches
//! run on their own tasks and report back through a channel; a result whose
//! session id is no longer the pending one is stopped on arrival.
//!
//! Session events pass a single identity check against the current session;
//! events from superseded or torn-down sessions are dropped there. Events from
//! the pending launch can overtake its launch result, so they are held until
//! the result arrives and replayed once that session becomes current.

use std::sync::Arc;

use nexus_common::config::validate_crossfade;
use nexus_common::{Catalog, NexusEvent, PlayerStatus, SettingsStore, SourceDescriptor, StatusUpdate};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorTiming;
use crate::error::{Error, Result};
use crate::playback::crossfade::{round_volume, CrossfadeHandle, CrossfadePlan};
use crate::playback::events::{EngineEvent, SessionEvent, SessionId};
use crate::playback::recovery::ResurrectionTimer;
use crate::playback::session::{EngineLauncher, PlaybackSession};
use crate::playback::state::SupervisorState;
use crate::playback::watchdog::{sleep_until_deadline, Watchdog};
use crate::state::SharedState;

/// Commands accepted by the supervisor task
#[derive(Debug)]
pub enum SupervisorCommand {
    Select(SourceDescriptor),
    TogglePause,
    Stop,
    SetVolume(f64),
    /// Stop everything and end the task; the sender is signalled when done
    Shutdown(oneshot::Sender<()>),
}

/// Why a selection is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    User,
    Resurrection,
}

/// Result of one launch task
struct LaunchFinished<S> {
    id: SessionId,
    source: SourceDescriptor,
    fade_seconds: f64,
    result: Result<Arc<S>>,
}

/// The current session and what it has reported so far
struct ActiveSession<S> {
    id: SessionId,
    session: Arc<S>,
    source: SourceDescriptor,
    heard_heartbeat: bool,
    now_playing: Option<String>,
    resuming: bool,
}

pub struct Supervisor<L: EngineLauncher> {
    launcher: Arc<L>,
    settings: SettingsStore,
    timing: SupervisorTiming,
    shared: Arc<SharedState>,

    state: SupervisorState,
    next_session: SessionId,
    pending_launch: Option<SessionId>,
    /// Events from the pending launch that arrived before its result
    early_events: Vec<SessionEvent>,
    /// Pending launch is a resurrection attempt
    reconnecting: bool,
    active: Option<ActiveSession<L::Session>>,
    /// Intended playback target; None only when deliberately off
    active_source: Option<SourceDescriptor>,
    paused_by_user: bool,
    buffering: bool,

    watchdog: Watchdog,
    resurrection: ResurrectionTimer,
    crossfade: Option<CrossfadeHandle<L::Session>>,

    session_tx: mpsc::UnboundedSender<SessionEvent>,
    launch_tx: mpsc::UnboundedSender<LaunchFinished<L::Session>>,
}

impl<L: EngineLauncher> Supervisor<L> {
    /// Start the supervisor task
    pub fn spawn(
        launcher: Arc<L>,
        catalog: Catalog,
        settings: SettingsStore,
        timing: SupervisorTiming,
        shared: Arc<SharedState>,
    ) -> (SupervisorHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (launch_tx, launch_rx) = mpsc::unbounded_channel();

        let supervisor = Supervisor {
            launcher,
            settings: settings.clone(),
            timing,
            shared: Arc::clone(&shared),
            state: SupervisorState::Off,
            next_session: SessionId::new(1),
            pending_launch: None,
            early_events: Vec::new(),
            reconnecting: false,
            active: None,
            active_source: None,
            paused_by_user: false,
            buffering: false,
            watchdog: Watchdog::new(timing.watchdog),
            resurrection: ResurrectionTimer::new(timing.recovery),
            crossfade: None,
            session_tx,
            launch_tx,
        };

        let task = tokio::spawn(supervisor.run(command_rx, launch_rx, session_rx));

        let handle = SupervisorHandle {
            commands: command_tx,
            catalog: Arc::new(catalog),
            settings,
            shared,
        };

        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SupervisorCommand>,
        mut launches: mpsc::UnboundedReceiver<LaunchFinished<L::Session>>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        info!("Playback supervisor started");

        loop {
            let watchdog_deadline = self.watchdog.deadline();
            let resurrection_deadline = self.resurrection.deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.on_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.stop();
                        break;
                    }
                },
                Some(finished) = launches.recv() => self.on_launch_finished(finished),
                Some(event) = events.recv() => self.on_session_event(event),
                _ = sleep_until_deadline(watchdog_deadline) => self.on_watchdog_deadline(),
                _ = sleep_until_deadline(resurrection_deadline) => self.on_resurrection_due(),
            }
        }

        info!("Playback supervisor stopped");
    }

    /// Returns false once the task should end
    fn on_command(&mut self, command: SupervisorCommand) -> bool {
        match command {
            SupervisorCommand::Select(source) => self.select_source(source, Trigger::User),
            SupervisorCommand::TogglePause => self.toggle_pause(),
            SupervisorCommand::Stop => self.stop(),
            SupervisorCommand::SetVolume(level) => self.set_volume(level),
            SupervisorCommand::Shutdown(done) => {
                self.stop();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn select_source(&mut self, source: SourceDescriptor, trigger: Trigger) {
        self.resurrection.cancel();
        if trigger == Trigger::User {
            self.resurrection.reset_failures();
        }

        let id = self.next_session;
        self.next_session = id.next();
        if let Some(superseded) = self.pending_launch.replace(id) {
            debug!(session = %superseded, "Pending launch superseded");
        }
        self.early_events.clear();
        self.reconnecting = trigger == Trigger::Resurrection;
        self.active_source = Some(source.clone());

        let fade_seconds = self.settings.load().crossfade_seconds();
        info!(
            source = %source.id,
            session = %id,
            trigger = ?trigger,
            "Tuning to {}",
            source.display_name
        );

        let launcher = Arc::clone(&self.launcher);
        let events = self.session_tx.clone();
        let launch_tx = self.launch_tx.clone();
        tokio::spawn(async move {
            let result = launcher
                .launch(id, source.stream_url.clone(), 0.0, events)
                .await;
            let finished = LaunchFinished {
                id,
                source,
                fade_seconds,
                result,
            };
            // Supervisor gone: nobody will ever own this session
            if let Err(mpsc::error::SendError(finished)) = launch_tx.send(finished) {
                if let Ok(session) = finished.result {
                    session.stop();
                }
            }
        });

        self.transition(SupervisorState::Tuning);
        self.publish();
    }

    fn on_launch_finished(&mut self, finished: LaunchFinished<L::Session>) {
        if self.pending_launch != Some(finished.id) {
            debug!(session = %finished.id, "Discarding superseded launch");
            if let Ok(session) = finished.result {
                session.stop();
            }
            return;
        }
        self.pending_launch = None;
        self.reconnecting = false;
        let early_events = std::mem::take(&mut self.early_events);

        let session = match finished.result {
            Ok(session) => session,
            Err(e) => {
                error!(
                    source = %finished.source.id,
                    session = %finished.id,
                    "Failed to start engine: {}",
                    e
                );
                self.shutdown_playback();
                self.transition(SupervisorState::Off);
                self.shared.broadcast_event(NexusEvent::error(
                    e.to_string(),
                    Some(finished.source.id.clone()),
                ));
                self.publish();
                return;
            }
        };

        // Any running fade is stale; its outgoing session goes now
        if let Some(crossfade) = self.crossfade.take() {
            crossfade.cancel();
        }
        let outgoing = self.active.take().map(|previous| previous.session);

        self.active = Some(ActiveSession {
            id: finished.id,
            session: Arc::clone(&session),
            source: finished.source.clone(),
            heard_heartbeat: false,
            now_playing: None,
            resuming: false,
        });
        self.paused_by_user = false;
        self.buffering = session.is_buffering();
        self.watchdog.arm_for(Instant::now(), self.timing.startup_grace);

        let plan = CrossfadePlan::new(finished.fade_seconds, self.timing.crossfade_tick);
        info!(
            source = %finished.source.id,
            session = %finished.id,
            steps = plan.total_steps,
            "Session live, crossfading in"
        );
        self.crossfade = Some(CrossfadeHandle::spawn(outgoing, session, plan));

        self.transition(SupervisorState::Live);
        self.publish();

        if !early_events.is_empty() {
            debug!(
                session = %finished.id,
                count = early_events.len(),
                "Replaying events received before launch result"
            );
        }
        for event in early_events {
            self.on_session_event(event);
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        if self.pending_launch == Some(event.session) {
            self.early_events.push(event);
            return;
        }
        let Some(active) = self.active.as_mut() else {
            debug!(session = %event.session, "Ignoring event with no current session");
            return;
        };
        if active.id != event.session {
            debug!(
                session = %event.session,
                current = %active.id,
                "Ignoring event from stale session"
            );
            return;
        }

        match event.event {
            EngineEvent::TitleChanged(title) => {
                debug!(session = %active.id, title = %title, "Title changed");
                active.now_playing = Some(title);
                self.publish();
            }
            EngineEvent::Heartbeat => {
                let first = !active.heard_heartbeat;
                let was_resuming = active.resuming;
                active.heard_heartbeat = true;
                active.resuming = false;
                if first {
                    debug!(session = %active.id, "First heartbeat");
                    self.resurrection.reset_failures();
                }
                if !self.paused_by_user {
                    self.watchdog.arm(Instant::now(), self.buffering);
                }
                if first || was_resuming {
                    self.publish();
                }
            }
            EngineEvent::PauseChanged(paused) => self.on_pause_changed(paused),
            EngineEvent::BufferingChanged(buffering) => {
                debug!(session = %active.id, buffering, "Buffering changed");
                self.buffering = buffering;
                if !self.paused_by_user {
                    self.watchdog.arm(Instant::now(), buffering);
                }
                self.publish();
            }
            EngineEvent::UnexpectedExit { code } => {
                warn!(session = %active.id, ?code, "Engine exited unexpectedly");
                self.recover("engine exited");
            }
        }
    }

    fn on_pause_changed(&mut self, paused: bool) {
        if paused == self.paused_by_user {
            return;
        }
        self.paused_by_user = paused;

        if paused {
            self.watchdog.disarm();
            if self.state == SupervisorState::Live {
                self.transition(SupervisorState::Paused);
            }
        } else {
            self.watchdog.arm(Instant::now(), self.buffering);
            if let Some(active) = self.active.as_mut() {
                active.resuming = true;
            }
            if self.state == SupervisorState::Paused {
                self.transition(SupervisorState::Live);
            }
        }
        self.publish();
    }

    fn on_watchdog_deadline(&mut self) {
        if !self.watchdog.expire(Instant::now()) {
            return;
        }
        if self.paused_by_user {
            return;
        }
        warn!(
            session = ?self.active.as_ref().map(|a| a.id),
            buffering = self.buffering,
            "No heartbeat within tolerance, session declared dead"
        );
        self.recover("heartbeat timeout");
    }

    /// Tear down the dead current session and schedule a resurrection
    fn recover(&mut self, reason: &str) {
        self.watchdog.disarm();
        if let Some(crossfade) = self.crossfade.take() {
            crossfade.cancel();
        }
        if let Some(dead) = self.active.take() {
            debug!(session = %dead.id, reason, "Tearing down dead session");
            dead.session.stop();
        }
        self.paused_by_user = false;
        self.buffering = false;

        if self.pending_launch.is_some() {
            // A launch for the intended source is already underway
            self.publish();
            return;
        }

        match self.active_source.clone() {
            Some(source) => {
                let delay = self.resurrection.schedule(Instant::now(), source.clone());
                info!(
                    source = %source.id,
                    reason,
                    delay_ms = delay.as_millis() as u64,
                    failures = self.resurrection.consecutive_failures(),
                    "Scheduling resurrection"
                );
                self.transition(SupervisorState::Recovering);
            }
            None => self.transition(SupervisorState::Off),
        }
        self.publish();
    }

    fn on_resurrection_due(&mut self) {
        if let Some(source) = self.resurrection.take_due(Instant::now()) {
            info!(source = %source.id, "Resurrecting");
            self.select_source(source, Trigger::Resurrection);
        }
    }

    fn toggle_pause(&mut self) {
        match (&self.active, self.state) {
            (Some(active), SupervisorState::Live | SupervisorState::Paused) => {
                debug!(session = %active.id, "Toggling pause");
                active.session.toggle_pause();
            }
            _ => debug!(state = %self.state, "Toggle ignored, nothing playing"),
        }
    }

    fn set_volume(&mut self, level: f64) {
        match &self.active {
            Some(active) if active.session.is_live() => {
                active.session.set_volume(round_volume(level));
            }
            _ => debug!("Volume ignored, no live session"),
        }
    }

    /// User stop: cancel everything and go Off
    fn stop(&mut self) {
        if self.state != SupervisorState::Off || self.active.is_some() || self.crossfade.is_some() {
            info!(state = %self.state, "Stopping playback");
        }
        self.shutdown_playback();
        self.transition(SupervisorState::Off);
        self.publish();
    }

    /// Cancel timers, forget the intended source and terminate every session
    fn shutdown_playback(&mut self) {
        self.resurrection.cancel();
        self.watchdog.disarm();
        self.active_source = None;
        self.pending_launch = None;
        self.early_events.clear();
        self.reconnecting = false;
        if let Some(crossfade) = self.crossfade.take() {
            crossfade.cancel();
        }
        if let Some(active) = self.active.take() {
            active.session.stop();
        }
        self.paused_by_user = false;
        self.buffering = false;
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    /// Publish the current status if it differs from the last one
    fn publish(&self) {
        let status = self.current_status();
        if self.shared.supervisor_state() == self.state && self.shared.status() == status {
            return;
        }
        self.shared.publish_status(self.state, status);
    }

    fn current_status(&self) -> StatusUpdate {
        match self.state {
            SupervisorState::Off => StatusUpdate::off(),
            SupervisorState::Tuning | SupervisorState::Recovering => {
                let text = if self.state == SupervisorState::Recovering || self.reconnecting {
                    "Reconnecting..."
                } else {
                    "Tuning..."
                };
                match &self.active_source {
                    Some(source) => StatusUpdate::for_source(PlayerStatus::Loading, source, text),
                    None => StatusUpdate::off(),
                }
            }
            SupervisorState::Paused => match &self.active {
                Some(active) => StatusUpdate::for_source(PlayerStatus::Paused, &active.source, "Paused"),
                None => StatusUpdate::off(),
            },
            SupervisorState::Live => match &self.active {
                Some(active) if self.buffering || (!active.heard_heartbeat && active.now_playing.is_none()) => {
                    StatusUpdate::for_source(PlayerStatus::Loading, &active.source, "Buffering...")
                }
                Some(active) if active.resuming => {
                    StatusUpdate::for_source(PlayerStatus::Playing, &active.source, "Resuming...")
                }
                Some(active) => {
                    let text = active
                        .now_playing
                        .clone()
                        .unwrap_or_else(|| active.source.display_name.clone());
                    StatusUpdate::for_source(PlayerStatus::Playing, &active.source, text)
                }
                None => StatusUpdate::off(),
            },
        }
    }
}

/// Cloneable front door to the supervisor task
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    catalog: Arc<Catalog>,
    settings: SettingsStore,
    shared: Arc<SharedState>,
}

impl SupervisorHandle {
    /// Start playing the source with the given id
    ///
    /// Unknown ids are reported to the caller and broadcast as an error
    /// notice; supervisor state is left untouched.
    pub fn play(&self, source_id: &str) -> Result<SourceDescriptor> {
        let source = match self.catalog.get(source_id) {
            Ok(source) => source.clone(),
            Err(_) => {
                warn!(source = source_id, "Unknown source requested");
                self.shared.broadcast_event(NexusEvent::error(
                    format!("Unknown source: {}", source_id),
                    Some(source_id.to_string()),
                ));
                return Err(Error::UnknownSource(source_id.to_string()));
            }
        };
        self.send(SupervisorCommand::Select(source.clone()))?;
        Ok(source)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(SupervisorCommand::TogglePause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(SupervisorCommand::Stop)
    }

    /// Set the output level (0-100) of the current session
    pub fn set_volume(&self, level: f64) -> Result<()> {
        if !level.is_finite() || !(0.0..=100.0).contains(&level) {
            return Err(Error::InvalidInput(format!(
                "volume must be between 0 and 100 (got {})",
                level
            )));
        }
        self.send(SupervisorCommand::SetVolume(level))
    }

    /// Persist a new crossfade duration; takes effect on the next selection
    pub fn set_fade(&self, seconds: f64) -> Result<f64> {
        let seconds = validate_crossfade(seconds).map_err(|e| match e {
            nexus_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            other => Error::Common(other),
        })?;
        self.settings.set_crossfade_seconds(seconds)?;
        Ok(seconds)
    }

    /// Crossfade duration the next selection will use
    pub fn fade_seconds(&self) -> f64 {
        self.settings.load().crossfade_seconds()
    }

    pub fn status(&self) -> StatusUpdate {
        self.shared.status()
    }

    pub fn state(&self) -> SupervisorState {
        self.shared.supervisor_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NexusEvent> {
        self.shared.subscribe_events()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Stop playback and wait for the supervisor task to finish
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(SupervisorCommand::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    fn send(&self, command: SupervisorCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::SupervisorGone)
    }
}
