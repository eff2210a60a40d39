//! Resurrection scheduling
//!
//! After a session is declared dead the supervisor schedules exactly one
//! resurrection attempt for the intended source. [`BackoffPolicy`] decides
//! how long to wait; [`ResurrectionTimer`] holds the pending attempt.
//!
//! The delay for consecutive failure `n` (0-indexed) is `first × factor^n`,
//! capped at `max`. With the default factor of 1.0 every attempt waits the
//! same fixed delay. The failure count resets once a resurrected session
//! proves itself with a heartbeat, or when the user picks a source.

use std::time::Duration;

use nexus_common::config::RecoveryConfig;
use nexus_common::SourceDescriptor;
use tokio::time::Instant;

/// Resurrection back-off policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first attempt
    pub first: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth factor per consecutive failure (1.0 = fixed delay)
    pub factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 1.0,
        }
    }
}

impl From<&RecoveryConfig> for BackoffPolicy {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            first: Duration::from_millis(config.first_delay_ms),
            max: Duration::from_millis(config.max_delay_ms.max(config.first_delay_ms)),
            factor: if config.factor.is_finite() && config.factor >= 1.0 {
                config.factor
            } else {
                1.0
            },
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given consecutive failure (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[derive(Debug, Clone)]
struct PendingResurrection {
    due: Instant,
    source: SourceDescriptor,
}

/// At most one pending resurrection, plus the consecutive failure count
#[derive(Debug)]
pub struct ResurrectionTimer {
    policy: BackoffPolicy,
    pending: Option<PendingResurrection>,
    consecutive_failures: u32,
}

impl ResurrectionTimer {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            pending: None,
            consecutive_failures: 0,
        }
    }

    /// Schedule an attempt for `source`, replacing any pending one.
    ///
    /// Returns the chosen delay.
    pub fn schedule(&mut self, now: Instant, source: SourceDescriptor) -> Duration {
        let delay = self.policy.delay(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.pending = Some(PendingResurrection {
            due: now + delay,
            source,
        });
        delay
    }

    /// Drop the pending attempt, if any
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending source once its delay has elapsed
    pub fn take_due(&mut self, now: Instant) -> Option<SourceDescriptor> {
        match &self.pending {
            Some(pending) if now >= pending.due => self.pending.take().map(|p| p.source),
            _ => None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }
}
