//! Retry delay computation.
//!
//! `delay(attempt) = min(initial * multiplier^(attempt - 1), max) + jitter`
//! where `jitter` is uniform in `[0, initial)`.

use crate::config::RetryConfig;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Computes exponential backoff delays with jitter.
///
/// The random source is injected so tests can seed it; production code uses
/// [`BackoffScheduler::new`], which seeds from OS entropy.
#[derive(Debug)]
pub struct BackoffScheduler {
    config: RetryConfig,
    rng: Mutex<StdRng>,
}

impl BackoffScheduler {
    /// Creates a scheduler seeded from OS entropy.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a scheduler with the given random source.
    pub fn with_rng(config: RetryConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Creates a scheduler with a fixed seed.
    pub fn seeded(config: RetryConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `attempt` (1-indexed), without jitter.
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);

        let initial = self.config.initial_delay.as_nanos() as f64;
        let max = self.config.max_delay.as_nanos() as f64;
        let raw = initial * self.config.backoff_multiplier.powi(exponent);

        let capped = if raw.is_finite() { raw.min(max) } else { max };
        Duration::from_nanos(capped.max(0.0) as u64)
    }

    /// Delay before retry number `attempt` (1-indexed), with jitter if enabled.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.config.add_jitter {
            return base;
        }

        let range = u64::try_from(self.config.initial_delay.as_nanos()).unwrap_or(u64::MAX);
        if range == 0 {
            return base;
        }

        let jitter = self.rng.lock().gen_range(0..range);
        base.saturating_add(Duration::from_nanos(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(1000))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_millis(30_000))
    }

    #[test]
    fn base_delays_double_then_cap() {
        let scheduler = BackoffScheduler::seeded(config(), 7);
        let delays: Vec<u64> = (1..=8)
            .map(|attempt| scheduler.base_delay(attempt).as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn jitter_stays_within_initial_delay() {
        let scheduler = BackoffScheduler::seeded(config(), 42);
        for attempt in 1..=10 {
            for _ in 0..50 {
                let base = scheduler.base_delay(attempt);
                let delay = scheduler.compute_delay(attempt);
                assert!(delay >= base);
                assert!(delay < base + Duration::from_millis(1000));
            }
        }
    }

    #[test]
    fn same_seed_same_delays() {
        let a = BackoffScheduler::seeded(config(), 1234);
        let b = BackoffScheduler::seeded(config(), 1234);
        for attempt in 1..=6 {
            assert_eq!(a.compute_delay(attempt), b.compute_delay(attempt));
        }
    }

    #[test]
    fn jitter_disabled_is_exact() {
        let scheduler = BackoffScheduler::new(config().with_jitter(false));
        assert_eq!(scheduler.compute_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn attempt_zero_and_huge_attempts() {
        let scheduler = BackoffScheduler::seeded(config().with_jitter(false), 0);
        assert_eq!(scheduler.compute_delay(0), Duration::from_millis(1000));
        assert_eq!(
            scheduler.compute_delay(u32::MAX),
            Duration::from_millis(30_000)
        );
    }

    #[test]
    fn no_retry_config_has_zero_delay() {
        let scheduler = BackoffScheduler::new(RetryConfig::no_retry());
        assert_eq!(scheduler.compute_delay(1), Duration::ZERO);
    }
}
