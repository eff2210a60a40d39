//! Engine process controller
//!
//! One [`EngineSession`] owns one engine process and one control channel.
//!
//! # Lifecycle
//!
//! ```text
//! created ─► connecting ─► live ─► terminated
//!                 │                     ▲
//!                 └─────────────────────┘  (unreachable / spawn failure)
//! ```
//!
//! Startup spawns the process, then retries the control endpoint a fixed
//! number of times. On the first connection the four observed properties
//! are registered and the session turns live. Failure at any point leaves
//! nothing running.
//!
//! # Tasks
//!
//! - **reader**: decodes inbound lines into session events, in arrival order
//! - **writer**: serializes outbound commands
//! - **exit watcher**: waits on the process; kills the tree on request and
//!   reports an exit that happens while the session is still live
//!
//! `stop()` clears the live flag before terminating, so a deliberate stop is
//! never reported as an unexpected exit. An exit during the handshake, before
//! the session turned live, is reported by `attach` instead; whichever side
//! clears the live flag reports it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::engine::endpoint::{ChannelReader, ChannelWriter, IpcEndpoint};
use crate::engine::process::{engine_args, kill_tree, spawn_engine};
use crate::engine::protocol::{EngineCommand, LineDecoder};
use crate::error::{Error, Result};
use crate::playback::events::{EngineEvent, SessionEvent, SessionId};
use crate::playback::session::{EngineLauncher, PlaybackSession};

const READ_CHUNK: usize = 4096;

/// Flags shared with the session's tasks
#[derive(Debug, Default)]
struct SessionFlags {
    live: AtomicBool,
    buffering: AtomicBool,
    stopping: AtomicBool,
    exited: AtomicBool,
    exit_code: Mutex<Option<i32>>,
}

/// Handle to the exit watcher of a spawned process
struct ProcessWatch {
    pid: Option<u32>,
    kill_tx: oneshot::Sender<()>,
}

/// One running engine process and its control channel
pub struct EngineSession {
    id: SessionId,
    flags: Arc<SessionFlags>,
    volume: Mutex<f64>,
    commands: Mutex<Option<mpsc::UnboundedSender<EngineCommand>>>,
    process: Mutex<Option<ProcessWatch>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    endpoint: Option<IpcEndpoint>,
}

impl EngineSession {
    /// Spawn an engine for `stream_url` and wait for its control channel
    pub async fn start(
        id: SessionId,
        config: &EngineConfig,
        stream_url: &str,
        initial_volume: f64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<Self>> {
        let endpoint = IpcEndpoint::unique();
        let args = engine_args(&endpoint, stream_url, initial_volume);
        let child = spawn_engine(&config.command, &args)?;

        let flags = Arc::new(SessionFlags::default());
        let process = watch_process(id, child, Arc::clone(&flags), endpoint.clone(), events.clone());

        let policy = config.connect;
        let mut last_error = String::from("no attempt made");
        let mut channel = None;
        for attempt in 1..=policy.attempts {
            if flags.exited.load(Ordering::SeqCst) {
                last_error = "engine exited during startup".to_string();
                break;
            }
            match endpoint.connect().await {
                Ok(halves) => {
                    debug!(session = %id, attempt, "Control channel connected");
                    channel = Some(halves);
                    break;
                }
                Err(e) => {
                    trace!(session = %id, attempt, "Control channel not ready: {}", e);
                    last_error = e.to_string();
                    if attempt < policy.attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        let Some((reader, writer)) = channel else {
            warn!(session = %id, "Engine unreachable: {}", last_error);
            let _ = process.kill_tx.send(());
            endpoint.cleanup();
            return Err(Error::EngineUnreachable {
                attempts: policy.attempts,
                reason: last_error,
            });
        };

        let session = Self::attach(
            id,
            flags,
            Some(endpoint),
            Some(process),
            reader,
            writer,
            initial_volume,
            events,
        );
        info!(session = %id, "Engine session live");
        Ok(session)
    }

    /// Wire reader and writer tasks to an open channel and mark the session live
    #[allow(clippy::too_many_arguments)]
    fn attach(
        id: SessionId,
        flags: Arc<SessionFlags>,
        endpoint: Option<IpcEndpoint>,
        process: Option<ProcessWatch>,
        reader: ChannelReader,
        writer: ChannelWriter,
        initial_volume: f64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        for command in EngineCommand::observe_all() {
            let _ = command_tx.send(command);
        }

        flags.live.store(true, Ordering::SeqCst);
        if flags.exited.load(Ordering::SeqCst) && flags.live.swap(false, Ordering::SeqCst) {
            let code = *lock_or_recover(&flags.exit_code);
            warn!(session = %id, ?code, "Engine process exited during handshake");
            let _ = events.send(SessionEvent::new(id, EngineEvent::UnexpectedExit { code }));
        }

        let writer_task = tokio::spawn(write_commands(id, writer, command_rx));
        let reader_task = tokio::spawn(read_events(id, reader, Arc::clone(&flags), events));

        Arc::new(Self {
            id,
            flags,
            volume: Mutex::new(initial_volume),
            commands: Mutex::new(Some(command_tx)),
            process: Mutex::new(process),
            tasks: Mutex::new(vec![writer_task, reader_task]),
            endpoint,
        })
    }

    /// Last commanded output level
    pub fn volume(&self) -> f64 {
        *lock_or_recover(&self.volume)
    }

    fn send(&self, command: EngineCommand) {
        if !self.is_live() {
            return;
        }
        if let Some(tx) = lock_or_recover(&self.commands).as_ref() {
            let _ = tx.send(command);
        }
    }
}

impl PlaybackSession for EngineSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.flags.live.load(Ordering::SeqCst)
    }

    fn is_buffering(&self) -> bool {
        self.flags.buffering.load(Ordering::SeqCst)
    }

    fn set_volume(&self, level: f64) {
        if !self.is_live() {
            return;
        }
        let level = level.clamp(0.0, 100.0);
        *lock_or_recover(&self.volume) = level;
        self.send(EngineCommand::set_volume(level));
    }

    fn toggle_pause(&self) {
        self.send(EngineCommand::toggle_pause());
    }

    fn stop(&self) {
        if self.flags.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flags.live.store(false, Ordering::SeqCst);
        debug!(session = %self.id, "Stopping engine session");

        // Close the channel first
        lock_or_recover(&self.commands).take();
        for task in lock_or_recover(&self.tasks).drain(..) {
            task.abort();
        }

        if let Some(process) = lock_or_recover(&self.process).take() {
            // Err: the process already exited and the watcher cleaned up
            if process.kill_tx.send(()).is_err() {
                trace!(session = %self.id, pid = ?process.pid, "Engine already gone");
            }
        }

        if let Some(endpoint) = &self.endpoint {
            endpoint.cleanup();
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the exit watcher for a freshly started process
fn watch_process(
    id: SessionId,
    mut child: Child,
    flags: Arc<SessionFlags>,
    endpoint: IpcEndpoint,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> ProcessWatch {
    let pid = child.id();
    let (kill_tx, kill_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => {
                let code = status.ok().and_then(|s| s.code());
                *lock_or_recover(&flags.exit_code) = code;
                flags.exited.store(true, Ordering::SeqCst);
                let was_live = flags.live.swap(false, Ordering::SeqCst);
                if was_live && !flags.stopping.load(Ordering::SeqCst) {
                    warn!(session = %id, ?code, "Engine process exited while live");
                    let _ = events.send(SessionEvent::new(id, EngineEvent::UnexpectedExit { code }));
                } else {
                    debug!(session = %id, ?code, "Engine process exited");
                }
                if let Some(pid) = pid {
                    // Children of the engine may still hold the stream
                    kill_tree(pid);
                }
            }
            _ = kill_rx => {
                if let Some(pid) = pid {
                    kill_tree(pid);
                }
                if let Err(e) = child.kill().await {
                    trace!(session = %id, "Kill after group kill: {}", e);
                }
                flags.exited.store(true, Ordering::SeqCst);
                debug!(session = %id, "Engine process terminated");
            }
        }
        endpoint.cleanup();
    });

    ProcessWatch { pid, kill_tx }
}

async fn write_commands(
    id: SessionId,
    mut writer: ChannelWriter,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
) {
    while let Some(command) = commands.recv().await {
        let line = command.encode();
        trace!(session = %id, "-> {}", line.trim_end());
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(session = %id, "Control channel write failed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            debug!(session = %id, "Control channel flush failed: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_events(
    id: SessionId,
    mut reader: ChannelReader,
    flags: Arc<SessionFlags>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(session = %id, "Control channel closed by engine");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                debug!(session = %id, "Control channel read failed: {}", e);
                break;
            }
        };

        for event in decoder.decode(&buf[..n]) {
            if let EngineEvent::BufferingChanged(buffering) = event {
                flags.buffering.store(buffering, Ordering::SeqCst);
            }
            if !flags.live.load(Ordering::SeqCst) {
                return;
            }
            if events.send(SessionEvent::new(id, event)).is_err() {
                return;
            }
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Launcher spawning real engine processes
#[derive(Debug, Clone)]
pub struct MpvLauncher {
    config: EngineConfig,
}

impl MpvLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl EngineLauncher for MpvLauncher {
    type Session = EngineSession;

    fn launch(
        &self,
        id: SessionId,
        stream_url: String,
        initial_volume: f64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> impl std::future::Future<Output = Result<Arc<EngineSession>>> + Send {
        let config = self.config.clone();
        async move { EngineSession::start(id, &config, &stream_url, initial_volume, events).await }
    }
}
