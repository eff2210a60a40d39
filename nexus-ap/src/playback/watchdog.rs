//! Heartbeat watchdog
//!
//! A single restartable deadline owned by the supervisor. Every heartbeat
//! and every buffering change pushes the deadline out; if it is ever
//! reached, the current session is declared dead.
//!
//! The watchdog holds no task: it is a deadline the supervisor loop sleeps
//! on. Disarming clears the deadline, so a cancelled watchdog cannot fire,
//! and the loop re-reads the deadline on every iteration.

use std::time::Duration;

use tokio::time::Instant;

/// How long the watchdog waits for a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogTolerance {
    /// Engine believes it is playing normally
    pub steady: Duration,
    /// Engine reports it is starved for data
    pub buffering: Duration,
}

impl Default for WatchdogTolerance {
    fn default() -> Self {
        Self {
            steady: Duration::from_secs(3),
            buffering: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct Watchdog {
    tolerance: WatchdogTolerance,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(tolerance: WatchdogTolerance) -> Self {
        Self {
            tolerance,
            deadline: None,
        }
    }

    /// Tolerance for the given buffering state
    pub fn tolerance_for(&self, buffering: bool) -> Duration {
        if buffering {
            self.tolerance.buffering
        } else {
            self.tolerance.steady
        }
    }

    /// (Re)arm using the tolerance matching `buffering`
    pub fn arm(&mut self, now: Instant, buffering: bool) {
        let tolerance = self.tolerance_for(buffering);
        self.arm_for(now, tolerance);
    }

    /// (Re)arm with an explicit tolerance
    pub fn arm_for(&mut self, now: Instant, tolerance: Duration) {
        self.deadline = Some(now + tolerance);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed.
    ///
    /// Returns true exactly once per armed deadline; the watchdog is
    /// disarmed afterwards and stays so until the next `arm`.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.disarm();
                true
            }
            _ => false,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
///
/// Used as a `tokio::select!` branch: a cleared deadline simply never wins.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffering_tolerance_is_longer() {
        let watchdog = Watchdog::new(WatchdogTolerance::default());
        assert!(watchdog.tolerance_for(true) > watchdog.tolerance_for(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_fires_once() {
        let mut watchdog = Watchdog::new(WatchdogTolerance::default());
        let now = Instant::now();
        watchdog.arm(now, false);

        assert!(!watchdog.expire(now + Duration::from_secs(2)));
        assert!(watchdog.expire(now + Duration::from_secs(3)));
        assert!(!watchdog.is_armed());
        assert!(!watchdog.expire(now + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_pushes_deadline() {
        let mut watchdog = Watchdog::new(WatchdogTolerance::default());
        let start = Instant::now();
        watchdog.arm(start, false);

        let later = start + Duration::from_secs(2);
        watchdog.arm(later, false);
        assert!(!watchdog.expire(start + Duration::from_secs(4)));
        assert!(watchdog.expire(later + Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffering_widens_deadline() {
        let mut watchdog = Watchdog::new(WatchdogTolerance::default());
        let now = Instant::now();
        watchdog.arm(now, true);
        assert!(!watchdog.expire(now + Duration::from_secs(10)));
        assert!(watchdog.expire(now + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_watchdog_never_expires() {
        let mut watchdog = Watchdog::new(WatchdogTolerance::default());
        let now = Instant::now();
        watchdog.arm(now, false);
        watchdog.disarm();
        assert!(watchdog.deadline().is_none());
        assert!(!watchdog.expire(now + Duration::from_secs(60)));

        // Disarming twice is harmless
        watchdog.disarm();
        assert!(!watchdog.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_without_deadline_never_completes() {
        let result = tokio::time::timeout(Duration::from_secs(3600), sleep_until_deadline(None)).await;
        assert!(result.is_err());
    }
}
