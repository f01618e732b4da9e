//! Bounded retry schedule shared by navigation and the detail phase.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffScale {
    /// Same delay before every retry
    Fixed,
    /// `base × attempt`
    Linear,
}

/// Attempt budget plus a pure delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub scale: BackoffScale,
}

impl RetryPolicy {
    /// Linear backoff: the delay after attempt `n` is `base_delay × n`
    #[must_use]
    pub const fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            scale: BackoffScale::Linear,
        }
    }

    #[must_use]
    pub const fn fixed(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            scale: BackoffScale::Fixed,
        }
    }

    /// A single attempt with no retries
    #[must_use]
    pub const fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Attempt budget, never below one
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.scale {
            BackoffScale::Fixed => self.base_delay,
            BackoffScale::Linear => self.base_delay.saturating_mul(attempt.max(1)),
        }
    }

    /// Whether another attempt is allowed after `attempt` failed
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }

    /// Sum of all delays a candidate can wait before being dropped
    #[must_use]
    pub fn worst_case_delay(&self) -> Duration {
        (1..self.attempts()).map(|a| self.delay_for(a)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(
            crate::utils::DEFAULT_DETAIL_ATTEMPTS,
            crate::utils::DEFAULT_DETAIL_BACKOFF,
        )
    }
}
