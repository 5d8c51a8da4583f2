//! Circuit Breaker
//!
//! Fails fast once an operation keeps failing, with a single half-open probe
//! after the break elapses.

use std::sync::Mutex;
use std::time::Instant;

use crate::error::{AuthError, AuthResult, NetworkError};
use crate::types::{CircuitBreakerOptions, LoggingOptions};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without running.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    total_calls: u64,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker keyed to one logical operation.
///
/// Opens after `failure_threshold` consecutive recorded failures, once at
/// least `minimum_throughput` calls have been observed. After
/// `break_duration` a single probe call is admitted: success closes the
/// circuit and resets counters, failure reopens it and restarts the timer.
pub struct CircuitBreaker {
    operation: String,
    options: CircuitBreakerOptions,
    logging: LoggingOptions,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker for a named operation.
    pub fn new(
        operation: impl Into<String>,
        options: CircuitBreakerOptions,
        logging: LoggingOptions,
    ) -> Self {
        Self {
            operation: operation.into(),
            options,
            logging,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_calls: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Current state, resolving an elapsed break to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        let state = self.state.lock().unwrap();
        match state.state {
            CircuitState::Open if self.break_elapsed(&state) => CircuitState::HalfOpen,
            s => s,
        }
    }

    /// Close the circuit and clear all counters.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.total_calls = 0;
        state.opened_at = None;
        state.probe_in_flight = false;
    }

    fn break_elapsed(&self, state: &BreakerState) -> bool {
        state
            .opened_at
            .map(|t| t.elapsed() >= self.options.break_duration)
            .unwrap_or(false)
    }

    /// Admit or reject a call. Must be paired with [`on_success`] or
    /// [`on_failure`] when admitted (cancelled calls may skip the report).
    ///
    /// [`on_success`]: Self::on_success
    /// [`on_failure`]: Self::on_failure
    pub fn try_acquire(&self) -> AuthResult<()> {
        if !self.options.enabled {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap();
        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if self.break_elapsed(&state) {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    if self.logging.log_circuit_breaker_events {
                        tracing::info!(operation = %self.operation, "circuit half-open, probing");
                    }
                    Ok(())
                } else {
                    Err(AuthError::Network(NetworkError::CircuitOpen))
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    Err(AuthError::Network(NetworkError::CircuitOpen))
                } else {
                    state.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call.
    pub fn on_success(&self) {
        if !self.options.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        match state.state {
            CircuitState::Closed => state.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.total_calls = 0;
                state.opened_at = None;
                state.probe_in_flight = false;
                if self.logging.log_circuit_breaker_events {
                    tracing::info!(operation = %self.operation, "circuit closed after successful probe");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a call that was admitted but never completed (cancelled or
    /// failed outside the breaker's remit). Releases a pending probe without
    /// counting either way.
    pub fn release(&self) {
        if !self.options.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.state == CircuitState::HalfOpen {
            state.probe_in_flight = false;
        }
    }

    /// Record a failed call.
    pub fn on_failure(&self) {
        if !self.options.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.options.failure_threshold
                    && state.total_calls >= u64::from(self.options.minimum_throughput)
                {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    if self.logging.log_circuit_breaker_events {
                        tracing::warn!(
                            operation = %self.operation,
                            failures = state.consecutive_failures,
                            "circuit opened"
                        );
                    }
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.probe_in_flight = false;
                if self.logging.log_circuit_breaker_events {
                    tracing::warn!(operation = %self.operation, "probe failed, circuit reopened");
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(failure_threshold: u32, minimum_throughput: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "op",
            CircuitBreakerOptions {
                enabled: true,
                failure_threshold,
                break_duration: Duration::from_millis(50),
                minimum_throughput,
            },
            LoggingOptions::default(),
        )
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let breaker = breaker(3, 1);
        for _ in 0..2 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.try_acquire().unwrap();
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            breaker.try_acquire(),
            Err(AuthError::Network(NetworkError::CircuitOpen))
        ));
    }

    #[test]
    fn test_minimum_throughput_gates_opening() {
        let breaker = breaker(2, 10);
        for _ in 0..5 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        // Threshold exceeded but fewer than 10 calls observed.
        assert_eq!(breaker.state(), CircuitState::Closed);

        for _ in 0..5 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let breaker = breaker(3, 1);
        for _ in 0..2 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        breaker.try_acquire().unwrap();
        breaker.on_success();
        for _ in 0..2 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        // Never three in a row.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_probe_closes_on_success() {
        let breaker = breaker(1, 1);
        breaker.try_acquire().unwrap();
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Exactly one probe admitted.
        breaker.try_acquire().unwrap();
        assert!(breaker.try_acquire().is_err());

        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.try_acquire().unwrap();
    }

    #[test]
    fn test_half_open_probe_reopens_on_failure() {
        let breaker = breaker(1, 1);
        breaker.try_acquire().unwrap();
        breaker.on_failure();

        std::thread::sleep(Duration::from_millis(60));
        breaker.try_acquire().unwrap();
        breaker.on_failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn test_disabled_breaker_never_opens() {
        let breaker = CircuitBreaker::new(
            "op",
            CircuitBreakerOptions {
                enabled: false,
                failure_threshold: 1,
                break_duration: Duration::from_secs(30),
                minimum_throughput: 1,
            },
            LoggingOptions::default(),
        );
        for _ in 0..10 {
            breaker.try_acquire().unwrap();
            breaker.on_failure();
        }
        breaker.try_acquire().unwrap();
    }

    #[test]
    fn test_reset_closes_circuit() {
        let breaker = breaker(1, 1);
        breaker.try_acquire().unwrap();
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.try_acquire().unwrap();
    }
}
