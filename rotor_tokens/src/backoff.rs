//! Retry budget and backoff for transient authority failures

use std::time::Duration;

/// Configuration for how many attempts to make and how long to wait between them
///
/// The delay grows linearly: after the `n`th transient failure the caller waits
/// `n × base_delay` before trying again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryConfig {
    /// Default retry configuration
    ///
    /// Makes at most 3 attempts with a base delay of 1 second, giving delays of
    /// 1 and 2 seconds between them.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Constructs a new retry configuration
    ///
    /// A `max_attempts` of zero is treated as one: a request is always attempted.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// The maximum number of attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay after the first transient failure
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Per-request retry state
#[derive(Debug)]
pub struct RetryHandler {
    config: RetryConfig,
    attempts: u32,
}

impl RetryHandler {
    /// Constructs a new handler from a [`RetryConfig`], with no attempts recorded
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// The number of transient failures recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Reports a transient failure
    ///
    /// Returns how long to wait before the next attempt, or `None` if the attempt
    /// budget is spent.
    pub fn transient_failure(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.config.max_attempts {
            None
        } else {
            Some(self.config.base_delay.saturating_mul(self.attempts))
        }
    }
}

impl From<RetryConfig> for RetryHandler {
    fn from(config: RetryConfig) -> Self {
        Self::new(config)
    }
}
