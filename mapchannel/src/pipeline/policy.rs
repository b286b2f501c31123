//! Retry policy for transient source failures.
//!
//! # Example
//!
//! ```
//! use mapchannel::pipeline::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::exponential(3);
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```

use std::time::Duration;

/// First backoff pause in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Backoff pause cap in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Backoff growth factor.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of fetch attempts per pass (initial attempt plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How a channel retries retryable source failures.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RetryPolicy {
    /// Give up after the first failure.
    #[default]
    None,

    /// Retry after the same pause every time.
    Fixed {
        /// Fetch attempts per pass, counting the first.
        max_attempts: u32,
        /// Pause before each retry.
        delay: Duration,
    },

    /// Pause grows geometrically between attempts, up to a cap.
    ExponentialBackoff {
        /// Fetch attempts per pass, counting the first.
        max_attempts: u32,
        /// Pause before the first retry.
        initial_delay: Duration,
        /// Upper bound on any pause.
        max_delay: Duration,
        /// Growth factor per failed attempt.
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Backoff with the default pauses and `max_attempts` tries in total.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Constant-pause policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Pause to take after `attempt` failed tries (1 after the first
    /// failure), or `None` once the attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let capped = delay_ms.min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(capped as u64))
            }
        }
    }

    /// Attempt budget, counting the first. Always 1 for `None`.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}
