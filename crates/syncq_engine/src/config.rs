//! Configuration for the sync engine.

use crate::conflict::ConflictStrategy;
use std::time::Duration;

/// How the processor waits out a retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPacing {
    /// Record the earliest next attempt on the item and move on. The item is
    /// skipped by passes until its delay has elapsed.
    #[default]
    Deferred,
    /// Sleep for the delay before continuing with the next item. Stalls the
    /// whole pass; no concurrent remote calls.
    Inline,
}

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry configuration.
    pub retry: RetryConfig,
    /// How retry delays are applied.
    pub pacing: RetryPacing,
    /// Strategy used by [`crate::SyncEngine::resolve_conflict`] when none is given.
    pub conflict_strategy: ConflictStrategy,
}

impl EngineConfig {
    /// Creates a new engine configuration with defaults.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            pacing: RetryPacing::default(),
            conflict_strategy: ConflictStrategy::default(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the maximum number of attempts per item.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Sets the retry pacing.
    pub fn with_pacing(mut self, pacing: RetryPacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Sets the default conflict strategy.
    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts before an item is marked failed.
    pub max_attempts: u32,
    /// Delay before the first retry; also the jitter range.
    pub initial_delay: Duration,
    /// Maximum delay between retries (before jitter).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns true if an item with `attempts` attempts may not be tried again.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}
