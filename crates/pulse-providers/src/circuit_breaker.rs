// ABOUTME: Circuit breaker guarding networked provider adapters against failing upstreams
// ABOUTME: Fails fast while a provider is down and probes recovery after a cool-down
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::models::ProviderId;
use pulse_core::errors::{ProviderError, ProviderResult};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through and failures are counted
    Closed,
    /// Requests fail immediately until the recovery timeout elapses
    Open,
    /// One probe request is in flight to test recovery
    HalfOpen,
}

/// Thresholds for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive retryable failures before the circuit opens
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    pub recovery_timeout: Duration,
    /// Consecutive probe successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

/// Per-provider circuit breaker
///
/// Only retryable failures (network errors, 5xx, 429) count toward opening the
/// circuit; authorization failures never do, so a stale token cannot lock a
/// provider out of its own refresh path.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Breaker with default thresholds
    #[must_use]
    pub fn new(provider: ProviderId) -> Self {
        Self::with_config(provider, CircuitBreakerConfig::default())
    }

    /// Breaker with custom thresholds
    #[must_use]
    pub const fn with_config(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                probe_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .map_or(CircuitState::Closed, |inner| inner.state)
    }

    /// Consecutive failures counted so far
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().map_or(0, |inner| inner.failures)
    }

    /// Admit a request, or fail with `CircuitBreakerOpen`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CircuitBreakerOpen` while the circuit is open and
    /// the recovery timeout has not elapsed, or while a probe is in flight.
    pub fn guard(&self) -> ProviderResult<()> {
        let Ok(mut inner) = self.inner.lock() else {
            return Ok(());
        };
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Err(self.open_error(&inner)),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(Duration::MAX, |at| at.elapsed());
                if elapsed >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                    info!(provider = %self.provider, "Circuit half-open, probing recovery");
                    Ok(())
                } else {
                    Err(self.open_error(&inner))
                }
            }
        }
    }

    /// Feed the outcome of an admitted request back into the breaker
    pub fn observe<T>(&self, outcome: &ProviderResult<T>) {
        match outcome {
            Ok(_) => self.record_success(),
            Err(error) if error.is_retryable() => self.record_failure(),
            Err(_) => self.record_answered(),
        }
    }

    /// Record a non-retryable failure: the upstream answered, so a probe ends
    fn record_answered(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.failures = 0;
            inner.probe_successes = 0;
            inner.opened_at = None;
            info!(provider = %self.provider, "Circuit closed, provider answered probe");
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.opened_at = None;
                    info!(provider = %self.provider, "Circuit closed, provider recovered");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a retryable failure
    pub fn record_failure(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.failures += 1;
        let trip = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen | CircuitState::Open => true,
        };
        if trip {
            if inner.state != CircuitState::Open {
                warn!(
                    provider = %self.provider,
                    failures = inner.failures,
                    recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                    "Circuit opened, provider failing"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Force the breaker back to closed
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = CircuitState::Closed;
            inner.failures = 0;
            inner.probe_successes = 0;
            inner.opened_at = None;
        }
    }

    fn open_error(&self, inner: &BreakerState) -> ProviderError {
        let remaining = inner.opened_at.map_or(Duration::ZERO, |at| {
            self.config.recovery_timeout.saturating_sub(at.elapsed())
        });
        ProviderError::CircuitBreakerOpen {
            provider: self.provider.to_string(),
            retry_after_secs: remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(
            ProviderId::CloudFitness,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: recovery,
                success_threshold: 1,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold_and_blocks() {
        let cb = breaker(2, Duration::from_secs(60));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(
            cb.guard(),
            Err(ProviderError::CircuitBreakerOpen { .. })
        ));
    }

    #[test]
    fn test_unauthorized_does_not_count() {
        let cb = breaker(1, Duration::from_secs(60));
        let outcome: ProviderResult<()> = Err(ProviderError::Unauthorized {
            provider: "cloud_fitness".to_owned(),
        });
        cb.observe(&outcome);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_probe_closes_on_success() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.guard().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.guard().is_err());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_probe_closes_on_non_retryable_error() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure();
        assert!(cb.guard().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let outcome: ProviderResult<()> = Err(ProviderError::Unauthorized {
            provider: "cloud_fitness".to_owned(),
        });
        cb.observe(&outcome);
        assert_eq!(cb.state(), CircuitState::Closed);
        for _ in 0..3 {
            assert!(cb.guard().is_ok());
        }
    }

    #[test]
    fn test_reset_closes_circuit() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure();
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.guard().is_ok());
    }
}
