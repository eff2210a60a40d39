//! Crossfade between two engine sessions
//!
//! Switching sources runs two engines at once for a short while: the
//! incoming one ramps 0 → 100 while the outgoing one ramps 100 → 0 in
//! lockstep, one step per fixed tick.
//!
//! # Ramp rules
//!
//! - `total_steps = ceil(duration / tick)`, `delta = 100 / total_steps`
//! - A tick where the incoming engine reports buffering is skipped and does
//!   not consume a step, so the fade cannot finish while the new source is
//!   still silent.
//! - A tick where the incoming engine is no longer live aborts the fade
//!   without sending any further command.
//! - Volumes are clamped to [0, 100] and rounded to one decimal.
//!
//! The outgoing session is terminated when the ramp completes (or aborts);
//! it is stale from the moment the incoming session became current.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::playback::session::PlaybackSession;

/// Fixed ramp tick (25 Hz)
pub const TICK_PERIOD: Duration = Duration::from_millis(40);

/// Clamp to [0, 100] and round to one decimal place
pub fn round_volume(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    (level.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Step count and per-step delta for one fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadePlan {
    pub total_steps: u32,
    pub step_delta: f64,
    pub tick: Duration,
}

impl CrossfadePlan {
    pub fn new(duration_secs: f64, tick: Duration) -> Self {
        let tick_ms = tick.as_millis() as f64;
        let duration_ms = if duration_secs.is_finite() {
            (duration_secs.max(0.0) * 1000.0).round()
        } else {
            0.0
        };

        let steps = if tick_ms > 0.0 {
            (duration_ms / tick_ms).ceil()
        } else {
            1.0
        };
        let total_steps = steps.clamp(1.0, u32::MAX as f64) as u32;

        Self {
            total_steps,
            step_delta: 100.0 / total_steps as f64,
            tick,
        }
    }
}

/// Result of one ramp tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Incoming session died; stop without further commands
    Aborted,
    /// Incoming session is buffering; no progress this tick
    Skipped,
    /// Apply these levels
    Step {
        incoming: f64,
        outgoing: f64,
        finished: bool,
    },
}

/// Ramp state machine, independent of timers and sessions
#[derive(Debug, Clone)]
pub struct CrossfadeRamp {
    plan: CrossfadePlan,
    step: u32,
}

impl CrossfadeRamp {
    pub fn new(plan: CrossfadePlan) -> Self {
        Self { plan, step: 0 }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.plan.total_steps
    }

    pub fn tick(&mut self, incoming_live: bool, incoming_buffering: bool) -> TickOutcome {
        if !incoming_live {
            return TickOutcome::Aborted;
        }
        if incoming_buffering {
            return TickOutcome::Skipped;
        }
        if self.is_finished() {
            return TickOutcome::Step {
                incoming: 100.0,
                outgoing: 0.0,
                finished: true,
            };
        }

        self.step += 1;
        let finished = self.is_finished();
        let level = if finished {
            100.0
        } else {
            (self.step as f64 * self.plan.step_delta).min(100.0)
        };

        TickOutcome::Step {
            incoming: round_volume(level),
            outgoing: round_volume(100.0 - level),
            finished,
        }
    }
}

/// How a fade ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeOutcome {
    Completed,
    Aborted,
}

/// Drive a fade to completion.
///
/// Runs on its own task; the caller keeps a [`CrossfadeHandle`] to cancel it.
pub async fn run_crossfade<S: PlaybackSession>(
    outgoing: Option<Arc<S>>,
    incoming: Arc<S>,
    plan: CrossfadePlan,
) -> CrossfadeOutcome {
    let mut ramp = CrossfadeRamp::new(plan);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + plan.tick, plan.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        incoming = %incoming.id(),
        outgoing = ?outgoing.as_ref().map(|s| s.id()),
        steps = plan.total_steps,
        "Crossfade started"
    );

    loop {
        ticker.tick().await;

        match ramp.tick(incoming.is_live(), incoming.is_buffering()) {
            TickOutcome::Aborted => {
                warn!(
                    incoming = %incoming.id(),
                    step = ramp.step(),
                    "Incoming session died mid-crossfade, aborting"
                );
                if let Some(outgoing) = outgoing {
                    outgoing.stop();
                }
                return CrossfadeOutcome::Aborted;
            }
            TickOutcome::Skipped => continue,
            TickOutcome::Step {
                incoming: incoming_level,
                outgoing: outgoing_level,
                finished,
            } => {
                incoming.set_volume(incoming_level);
                if let Some(outgoing) = &outgoing {
                    outgoing.set_volume(outgoing_level);
                }

                if finished {
                    if let Some(outgoing) = outgoing {
                        debug!(outgoing = %outgoing.id(), "Crossfade complete, stopping outgoing session");
                        outgoing.stop();
                    }
                    return CrossfadeOutcome::Completed;
                }
            }
        }
    }
}

/// A running fade
pub struct CrossfadeHandle<S: PlaybackSession> {
    task: JoinHandle<CrossfadeOutcome>,
    outgoing: Option<Arc<S>>,
}

impl<S: PlaybackSession> CrossfadeHandle<S> {
    pub fn spawn(outgoing: Option<Arc<S>>, incoming: Arc<S>, plan: CrossfadePlan) -> Self {
        let task = tokio::spawn(run_crossfade(outgoing.clone(), incoming, plan));
        Self { task, outgoing }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop ramping and terminate the outgoing session right away
    pub fn cancel(self) {
        self.task.abort();
        if let Some(outgoing) = self.outgoing {
            outgoing.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::events::SessionId;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct MockSession {
        id: SessionId,
        live: AtomicBool,
        buffering: AtomicBool,
        stopped: AtomicBool,
        volumes: Mutex<Vec<f64>>,
    }

    impl MockSession {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(id),
                live: AtomicBool::new(true),
                buffering: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                volumes: Mutex::new(Vec::new()),
            })
        }

        fn volumes(&self) -> Vec<f64> {
            self.volumes.lock().unwrap().clone()
        }
    }

    impl PlaybackSession for MockSession {
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
                self.volumes.lock().unwrap().push(level);
            }
        }
        fn toggle_pause(&self) {}
        fn stop(&self) {
            self.live.store(false, Ordering::SeqCst);
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_plan_step_counts() {
        assert_eq!(CrossfadePlan::new(1.5, TICK_PERIOD).total_steps, 38);
        assert_eq!(CrossfadePlan::new(5.0, TICK_PERIOD).total_steps, 125);
        assert_eq!(CrossfadePlan::new(0.5, TICK_PERIOD).total_steps, 13);
        assert_eq!(CrossfadePlan::new(0.0, TICK_PERIOD).total_steps, 1);
    }

    #[test]
    fn test_round_volume() {
        assert_eq!(round_volume(33.333), 33.3);
        assert_eq!(round_volume(66.66), 66.7);
        assert_eq!(round_volume(-4.0), 0.0);
        assert_eq!(round_volume(104.0), 100.0);
        assert_eq!(round_volume(f64::NAN), 0.0);
    }

    #[test]
    fn test_ramp_levels_sum_to_hundred() {
        for duration in [0.5, 1.5, 2.7, 5.0] {
            let plan = CrossfadePlan::new(duration, TICK_PERIOD);
            let mut ramp = CrossfadeRamp::new(plan);
            let mut last_incoming = 0.0;
            let mut steps = 0;

            loop {
                match ramp.tick(true, false) {
                    TickOutcome::Step {
                        incoming,
                        outgoing,
                        finished,
                    } => {
                        steps += 1;
                        assert!((incoming + outgoing - 100.0).abs() <= 0.1 + 1e-9);
                        assert!(incoming >= last_incoming, "incoming must ramp up");
                        last_incoming = incoming;
                        if finished {
                            assert_eq!(incoming, 100.0);
                            assert_eq!(outgoing, 0.0);
                            break;
                        }
                    }
                    other => panic!("unexpected outcome {:?}", other),
                }
            }
            assert_eq!(steps, plan.total_steps);
        }
    }

    #[test]
    fn test_buffering_tick_does_not_consume_a_step() {
        let plan = CrossfadePlan::new(0.12, TICK_PERIOD); // 3 steps
        let mut ramp = CrossfadeRamp::new(plan);

        assert!(matches!(ramp.tick(true, false), TickOutcome::Step { finished: false, .. }));
        assert_eq!(ramp.tick(true, true), TickOutcome::Skipped);
        assert_eq!(ramp.tick(true, true), TickOutcome::Skipped);
        assert_eq!(ramp.step(), 1);
        assert!(matches!(ramp.tick(true, false), TickOutcome::Step { finished: false, .. }));
        assert!(matches!(ramp.tick(true, false), TickOutcome::Step { finished: true, .. }));
    }

    #[test]
    fn test_dead_incoming_aborts() {
        let mut ramp = CrossfadeRamp::new(CrossfadePlan::new(1.0, TICK_PERIOD));
        ramp.tick(true, false);
        assert_eq!(ramp.tick(false, false), TickOutcome::Aborted);
        // Dead wins over buffering
        assert_eq!(ramp.tick(false, true), TickOutcome::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_and_out_then_stop_outgoing() {
        let outgoing = MockSession::new(1);
        let incoming = MockSession::new(2);
        let plan = CrossfadePlan::new(0.12, TICK_PERIOD);

        let outcome = run_crossfade(Some(outgoing.clone()), incoming.clone(), plan).await;
        assert_eq!(outcome, CrossfadeOutcome::Completed);

        assert_eq!(incoming.volumes(), vec![33.3, 66.7, 100.0]);
        assert_eq!(outgoing.volumes(), vec![66.7, 33.3, 0.0]);
        assert!(outgoing.stopped.load(Ordering::SeqCst));
        assert!(!incoming.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_without_outgoing() {
        let incoming = MockSession::new(1);
        let plan = CrossfadePlan::new(1.5, TICK_PERIOD);

        let outcome = run_crossfade(None, incoming.clone(), plan).await;
        assert_eq!(outcome, CrossfadeOutcome::Completed);
        assert_eq!(incoming.volumes().len(), 38);
        assert_eq!(incoming.volumes().last().copied(), Some(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_completes_while_buffering() {
        let outgoing = MockSession::new(1);
        let incoming = MockSession::new(2);
        incoming.buffering.store(true, Ordering::SeqCst);

        let handle = CrossfadeHandle::spawn(
            Some(outgoing.clone()),
            incoming.clone(),
            CrossfadePlan::new(0.2, TICK_PERIOD),
        );
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!handle.is_finished());
        assert!(incoming.volumes().is_empty());
        assert!(!outgoing.stopped.load(Ordering::SeqCst));

        incoming.buffering.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
        assert!(outgoing.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incoming_death_stops_commands() {
        let outgoing = MockSession::new(1);
        let incoming = MockSession::new(2);
        let plan = CrossfadePlan::new(5.0, TICK_PERIOD);

        let fade = tokio::spawn(run_crossfade(Some(outgoing.clone()), incoming.clone(), plan));
        tokio::time::sleep(Duration::from_millis(200)).await;
        incoming.live.store(false, Ordering::SeqCst);
        let sent_before_death = outgoing.volumes().len();

        let outcome = fade.await.unwrap();
        assert_eq!(outcome, CrossfadeOutcome::Aborted);
        assert_eq!(outgoing.volumes().len(), sent_before_death);
        assert!(outgoing.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_outgoing() {
        let outgoing = MockSession::new(1);
        let incoming = MockSession::new(2);
        let handle = CrossfadeHandle::spawn(
            Some(outgoing.clone()),
            incoming.clone(),
            CrossfadePlan::new(5.0, TICK_PERIOD),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.cancel();
        let sent = incoming.volumes().len();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(incoming.volumes().len(), sent);
        assert!(outgoing.stopped.load(Ordering::SeqCst));
    }
}
