use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Upstream health of one provider, as listed by the sources report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// Per-provider breaker consulted before every upstream call.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    /// An open breaker admits a single trial call once `open_timeout` elapsed.
    pub fn allow_request(&self) -> bool {
        let timeout = self.config.open_timeout;
        self.step(|phase| match phase {
            Phase::Open { since } if since.elapsed() >= timeout => (Phase::HalfOpen, true),
            Phase::Open { .. } => (phase, false),
            Phase::Closed { .. } | Phase::HalfOpen => (phase, true),
        })
    }

    pub fn record_success(&self) {
        self.step(|_| (Phase::Closed { failures: 0 }, ()));
    }

    pub fn record_failure(&self) {
        let threshold = self.config.failure_threshold;
        self.step(|phase| {
            let next = match phase {
                Phase::Closed { failures } => {
                    let failures = failures.saturating_add(1);
                    if failures >= threshold {
                        Phase::Open {
                            since: Instant::now(),
                        }
                    } else {
                        Phase::Closed { failures }
                    }
                }
                Phase::HalfOpen => Phase::Open {
                    since: Instant::now(),
                },
                Phase::Open { .. } => phase,
            };
            (next, ())
        });
    }

    pub fn state(&self) -> CircuitState {
        self.step(|phase| {
            let state = match phase {
                Phase::Closed { .. } => CircuitState::Closed,
                Phase::Open { .. } => CircuitState::Open,
                Phase::HalfOpen => CircuitState::HalfOpen,
            };
            (phase, state)
        })
    }

    // Every transition replaces the whole phase, so a poisoned lock still holds a valid one.
    fn step<T>(&self, transition: impl FnOnce(Phase) -> (Phase, T)) -> T {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, output) = transition(*phase);
        *phase = next;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            open_timeout,
        })
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let breaker = breaker(2, Duration::from_secs(60));

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let breaker = breaker(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn trial_call_after_timeout_closes_on_success_or_reopens_on_failure() {
        let breaker = breaker(1, Duration::from_millis(1));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(2));

        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(2));
        assert!(breaker.allow_request());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn state_serializes_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).expect("serializes"),
            "\"half_open\""
        );
    }
}
