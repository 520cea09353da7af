use reqwest_retry::{RetryDecision, RetryPolicy};
use std::{
    cmp,
    time::{Duration, SystemTime},
};

/// Retries at a fixed interval for the first few attempts, then backs off
/// exponentially (base 2) until `max_n_retries` is exhausted.
///
/// For `max_n_retries: 6`, `n_fixed_retries: 3` and `wait_time: 500ms` the
/// wait times are (ms): 500, 500, 500, 1000, 2000, 4000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedThenExponentialRetry {
    /// Maximum number of allowed retry attempts.
    pub max_n_retries: u32,
    /// Fixed wait time between retries, and the unit the exponential phase
    /// multiplies.
    pub wait_time: Duration,
    /// Number of fixed-interval retries before backing off exponentially.
    pub n_fixed_retries: u32,
}

impl FixedThenExponentialRetry {
    fn wait_for(&self, n_past_retries: u32) -> Duration {
        if n_past_retries < cmp::min(self.n_fixed_retries, self.max_n_retries) {
            return self.wait_time;
        }
        let exp = 2u32
            .checked_pow(n_past_retries - self.n_fixed_retries + 1)
            .unwrap_or(u32::MAX);
        self.wait_time.saturating_mul(exp)
    }
}

impl RetryPolicy for FixedThenExponentialRetry {
    fn should_retry(
        &self,
        _request_start_time: SystemTime,
        n_past_retries: u32,
    ) -> RetryDecision {
        if n_past_retries >= self.max_n_retries {
            RetryDecision::DoNotRetry
        } else {
            RetryDecision::Retry {
                execute_after: SystemTime::now() + self.wait_for(n_past_retries),
            }
        }
    }
}
