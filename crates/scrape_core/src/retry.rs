use std::time::Duration;

/// Request-level retry policy applied by the provider client.
///
/// This retries individual HTTP requests (transport errors and retryable
/// statuses). It composes with, and is independent of, the poll schedule that
/// repeats status checks.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub retryable_status: fn(u16) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(5),
            retryable_status: is_transient_status,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt may follow the (1-based) `attempt` just made.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        (self.retryable_status)(status)
    }

    /// Delay after the (1-based) failed `attempt`: `base * factor^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            1.0
        };
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * factor.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        if scaled.is_finite() {
            Duration::from_secs_f64(scaled.min(max))
        } else {
            self.max_delay
        }
    }
}

/// 5xx, 429 (rate limited) and 408 (request timeout).
pub fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}
