//! Write-path flood protection.
//!
//! The writer pump consults a [`FloodPolicy`] before every physical write:
//! while the connection is under budget the computed delay is zero, and
//! once the burst allowance is exhausted each further write is pushed far
//! enough into the future to hold the configured sustained rate.
//!
//! The accounting is a penalty/credit scheme: every write adds one line's
//! worth of penalty (`unit / rate`), penalty decays in real time, and
//! `burst` lines of credit are forgiven before any delay is imposed.
//! `history` caps the accumulated penalty (at `history × unit`), bounding
//! the backlog a burst of queued writers can build up.

use std::time::{Duration, Instant};

/// Flood-protection parameters: at most `rate` lines per `unit`, with
/// `burst` lines allowed in quick succession before throttling starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodPolicy {
    rate: u32,
    burst: u32,
    history: u32,
    unit: Duration,
}

impl FloodPolicy {
    /// Build a policy. `rate` and `history` are clamped to at least 1 and a
    /// zero `unit` disables throttling entirely.
    pub fn new(rate: u32, burst: u32, history: u32, unit: Duration) -> Self {
        Self {
            rate: rate.max(1),
            burst,
            history: history.max(1),
            unit,
        }
    }

    /// Penalty one line adds.
    fn cost(&self) -> Duration {
        self.unit / self.rate
    }

    /// Penalty forgiven before delays are imposed.
    fn credit(&self) -> Duration {
        self.cost() * self.burst
    }

    /// Ceiling on accumulated penalty.
    fn ceiling(&self) -> Duration {
        self.unit * self.history
    }
}

/// Per-connection accounting state for one [`FloodPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct FloodState {
    policy: FloodPolicy,
    last_write: Option<Instant>,
    penalty: Duration,
}

impl FloodState {
    pub(crate) fn new(policy: FloodPolicy) -> Self {
        Self {
            policy,
            last_write: None,
            penalty: Duration::ZERO,
        }
    }

    /// The delay to impose before the next write at time `now`, computed
    /// from the previous write's timestamp. An unknown previous timestamp
    /// (first write) or one not in the past yields zero.
    pub(crate) fn delay(&self, now: Instant) -> Duration {
        if self.policy.unit.is_zero() {
            return Duration::ZERO;
        }
        let Some(last) = self.last_write else {
            return Duration::ZERO;
        };
        if now <= last {
            return Duration::ZERO;
        }
        let decayed = self.penalty.saturating_sub(now - last);
        (decayed + self.policy.cost()).saturating_sub(self.policy.credit())
    }

    /// Record a completed write at time `now`.
    pub(crate) fn record(&mut self, now: Instant) {
        if self.policy.unit.is_zero() {
            return;
        }
        let decayed = match self.last_write {
            Some(last) if now > last => self.penalty.saturating_sub(now - last),
            Some(_) => self.penalty,
            None => Duration::ZERO,
        };
        self.penalty = (decayed + self.policy.cost()).min(self.policy.ceiling());
        self.last_write = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_throttle() {
        let mut fs = FloodState::new(FloodPolicy::new(5, 5, 5, Duration::from_secs(1)));
        let now = Instant::now();

        // First write has no previous timestamp.
        assert_eq!(fs.delay(now), Duration::ZERO);
        fs.record(now);

        // The remaining burst allowance goes untouched...
        let later = now + Duration::from_millis(1);
        for _ in 0..4 {
            assert_eq!(fs.delay(later), Duration::ZERO);
            fs.record(later);
        }

        // ...and the write after it is pushed out.
        assert!(fs.delay(later) > Duration::ZERO);
    }

    #[test]
    fn test_penalty_decays() {
        let mut fs = FloodState::new(FloodPolicy::new(5, 5, 5, Duration::from_secs(1)));
        let now = Instant::now();
        for _ in 0..6 {
            fs.record(now);
        }
        assert!(fs.delay(now + Duration::from_millis(1)) > Duration::ZERO);
        // Well past the window the penalty is fully decayed.
        assert_eq!(fs.delay(now + Duration::from_secs(10)), Duration::ZERO);
    }

    #[test]
    fn test_future_previous_timestamp_is_zero() {
        let mut fs = FloodState::new(FloodPolicy::new(5, 5, 5, Duration::from_secs(1)));
        let now = Instant::now();
        fs.record(now + Duration::from_secs(3600));
        assert_eq!(fs.delay(now), Duration::ZERO);
    }

    #[test]
    fn test_zero_unit_disables_throttling() {
        let mut fs = FloodState::new(FloodPolicy::new(5, 0, 5, Duration::ZERO));
        let now = Instant::now();
        for _ in 0..100 {
            fs.record(now);
        }
        assert_eq!(fs.delay(now), Duration::ZERO);
    }

    #[test]
    fn test_penalty_ceiling() {
        let policy = FloodPolicy::new(1, 0, 2, Duration::from_secs(1));
        let mut fs = FloodState::new(policy);
        let now = Instant::now();
        for _ in 0..100 {
            fs.record(now);
        }
        // Penalty is capped at history * unit, so the delay cannot exceed
        // the ceiling plus one line's cost.
        assert!(fs.delay(now + Duration::from_millis(1)) <= Duration::from_secs(3));
    }
}
