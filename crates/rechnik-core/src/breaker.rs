//! Circuit breaker guarding calls to a remote model service.
//!
//! Tracks a sliding window of call outcomes. When the failure rate over
//! a full-enough window crosses the threshold, the breaker opens and
//! callers are refused immediately. After a cooldown one trial call is
//! let through (half-open); its outcome decides whether the breaker
//! closes again or re-opens for another cooldown.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Failure rate in [0, 1] at or above which the breaker opens.
    pub failure_rate_threshold: f64,
    /// Outcomes required in the window before the rate is evaluated.
    pub min_calls: usize,
    /// Size of the sliding outcome window.
    pub window: usize,
    /// How long the breaker stays open before allowing a trial call.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_rate_threshold: 0.5,
            min_calls: 4,
            window: 10,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: BreakerConfig) -> Self {
        CircuitBreaker {
            name: name.to_string(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// Whether a call may proceed right now. An open breaker whose
    /// cooldown has elapsed moves to half-open and admits exactly one
    /// trial call; further callers are refused until it resolves.
    pub fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!(breaker = %self.name, "cooldown elapsed, trying half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::HalfOpen => {
                tracing::info!(breaker = %self.name, "trial call succeeded, closing");
                inner.state = BreakerState::Closed;
                inner.outcomes.clear();
                inner.opened_at = None;
                inner.trial_in_flight = false;
            }
            _ => self.push_outcome(&mut inner, true),
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "trial call failed, re-opening");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
            }
            _ => {
                self.push_outcome(&mut inner, false);
                self.evaluate(&mut inner);
            }
        }
    }

    fn push_outcome(&self, inner: &mut BreakerInner, ok: bool) {
        inner.outcomes.push_back(ok);
        while inner.outcomes.len() > self.config.window {
            inner.outcomes.pop_front();
        }
    }

    fn evaluate(&self, inner: &mut BreakerInner) {
        if inner.outcomes.len() < self.config.min_calls {
            return;
        }
        let failures = inner.outcomes.iter().filter(|ok| !**ok).count();
        let rate = failures as f64 / inner.outcomes.len() as f64;
        if rate >= self.config.failure_rate_threshold {
            tracing::warn!(
                breaker = %self.name,
                failure_rate = rate,
                "failure rate over threshold, opening"
            );
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    #[cfg(test)]
    fn force_cooldown_elapsed(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.opened_at = Some(Instant::now() - self.config.cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_rate_threshold: 0.5,
                min_calls: 4,
                window: 10,
                cooldown: Duration::from_secs(30),
            },
        )
    }

    #[test]
    fn test_stays_closed_below_min_calls() {
        let b = breaker();
        for _ in 0..3 {
            assert!(b.allow_call());
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn test_opens_on_failure_rate() {
        let b = breaker();
        b.record_success();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allow_call());
    }

    #[test]
    fn test_half_open_success_closes() {
        let b = breaker();
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        b.force_cooldown_elapsed();
        assert!(b.allow_call());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        // second caller refused while the trial is in flight
        assert!(!b.allow_call());
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allow_call());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let b = breaker();
        for _ in 0..4 {
            b.record_failure();
        }
        b.force_cooldown_elapsed();
        assert!(b.allow_call());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allow_call());
    }

    #[test]
    fn test_window_slides() {
        let b = breaker();
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        b.force_cooldown_elapsed();
        assert!(b.allow_call());
        b.record_success();
        // window cleared on close; old failures no longer count
        b.record_failure();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }
}
