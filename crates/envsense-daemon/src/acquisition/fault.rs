//! Per-sensor fault tracking and retry backoff.

use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff: `min(max, base * 2^(faults - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy. `max` is raised to `base` if smaller.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay before retrying after `consecutive_faults` failures in a row.
    pub fn delay(&self, consecutive_faults: u32) -> Duration {
        if consecutive_faults == 0 {
            return Duration::ZERO;
        }
        2u32.checked_pow(consecutive_faults - 1)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// Health of one sensor.
///
/// `Healthy` is the state with zero consecutive faults. Each failed read moves
/// to `Faulting(n + 1)` and schedules a retry; one successful read returns to
/// `Healthy`. There is no terminal state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultState {
    consecutive: u32,
    last_reason: Option<String>,
    retry_at: Option<Instant>,
}

impl FaultState {
    /// Records a failed read at `now` and returns the backoff delay.
    pub fn record_fault(
        &mut self,
        reason: impl Into<String>,
        policy: &BackoffPolicy,
        now: Instant,
    ) -> Duration {
        self.consecutive = self.consecutive.saturating_add(1);
        self.last_reason = Some(reason.into());

        let delay = policy.delay(self.consecutive);
        self.retry_at = Some(now + delay);
        delay
    }

    /// Moves the scheduled retry to no earlier than `earliest` and returns it.
    pub fn postpone_retry(&mut self, earliest: Instant) -> Instant {
        let at = self.retry_at.map_or(earliest, |at| at.max(earliest));
        self.retry_at = Some(at);
        at
    }

    /// Records a successful read, returning how many faults it ended.
    pub fn record_success(&mut self) -> u32 {
        let ended = self.consecutive;
        *self = Self::default();
        ended
    }

    /// Returns true with no outstanding faults.
    pub fn is_healthy(&self) -> bool {
        self.consecutive == 0
    }

    /// Failures since the last successful read.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Reason of the most recent failure while faulting.
    pub fn last_reason(&self) -> Option<&str> {
        self.last_reason.as_deref()
    }

    /// When the next retry is scheduled while faulting.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }
}
