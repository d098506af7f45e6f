//! Exponential backoff with bounded jitter

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Retry limits for transient failures on one key
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// No single delay exceeds this
    pub max_delay: Duration,

    /// Total attempts per call, including the first
    pub max_attempts: u32,

    /// Random perturbation as a fraction of the nominal delay
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
            jitter: config.jitter.clamp(0.0, 0.99),
        }
    }

    /// `base * 2^retry`, capped at `max_delay`
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Starts a fresh schedule for one call
    pub fn schedule(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            failures: 0,
            previous: Duration::ZERO,
        }
    }
}

/// Per-call retry schedule
///
/// Delays never decrease from one retry to the next and never exceed the cap,
/// even after jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    failures: u32,
    previous: Duration,
}

impl Backoff {
    /// Attempts that have failed so far
    pub fn attempts(&self) -> u32 {
        self.failures
    }

    /// Records a failed attempt and returns how long to wait before the next
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            return None;
        }

        let nominal = self.policy.nominal_delay(self.failures - 1);
        let jitter = self.policy.jitter;
        let factor = if jitter > 0.0 {
            rng.gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };

        let delay = nominal
            .mul_f64(factor)
            .max(self.previous)
            .min(self.policy.max_delay);
        self.previous = delay;
        Some(delay)
    }
}
