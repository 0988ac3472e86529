// Retry policy and backoff schedule shared by every remote call.

use std::time::Duration;

/// Uniform retry policy for the API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical call, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before retry number `retry` (1-based), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1_u32 << exp)
            .min(self.max_delay)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            retries: 0,
            last: Duration::ZERO,
        }
    }
}

/// Stateful delay schedule for one logical call.
///
/// Delays never decrease across retries and never exceed `max_delay`,
/// even when a server `Retry-After` hint is smaller than the previous delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
    last: Duration,
}

impl Backoff {
    /// Delay before the next retry, honouring an optional server hint.
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Duration {
        self.retries += 1;
        let exp = self.policy.delay_for(self.retries);
        let wanted = hint.map_or(exp, |h| h.max(exp));
        let delay = wanted.min(self.policy.max_delay).max(self.last);
        self.last = delay;
        delay
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}
