//! Channel configuration.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::pipeline::{RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_MAX_ATTEMPTS};

/// Settings for a [`MapChannel`](super::MapChannel).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// How retryable source failures are retried within a pass.
    pub retry: RetryPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::exponential(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl ChannelConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Never retry.
    pub fn without_retries(self) -> Self {
        self.with_retry_policy(RetryPolicy::None)
    }

    /// Build from the `[channel]` section of a config file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let channel = &config.channel;
        Self {
            retry: RetryPolicy::ExponentialBackoff {
                max_attempts: channel.max_attempts,
                initial_delay: Duration::from_millis(channel.retry_initial_delay_ms),
                max_delay: Duration::from_millis(channel.retry_max_delay_ms),
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries() {
        assert_eq!(ChannelConfig::default().retry.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(ChannelConfig::new().without_retries().retry, RetryPolicy::None);
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.channel.max_attempts = 4;
        file.channel.retry_initial_delay_ms = 10;
        file.channel.retry_max_delay_ms = 40;

        let config = ChannelConfig::from_config_file(&file);
        assert_eq!(config.retry.max_attempts(), 4);
        assert_eq!(config.retry.delay_for_attempt(1), Some(Duration::from_millis(10)));
        assert_eq!(config.retry.delay_for_attempt(3), Some(Duration::from_millis(40)));
        assert_eq!(config.retry.delay_for_attempt(4), None);
    }
}
