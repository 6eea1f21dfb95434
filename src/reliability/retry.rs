use std::time::Duration;

/// Linear backoff for sink delivery.
///
/// The first attempt is immediate; retry `n` (1-based) waits `base_delay * n`. There is no
/// jitter and no cap: batches are small and sinks are expected to be local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_count: u32, base_delay: Duration) -> Self {
        Self {
            retry_count,
            base_delay,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Sum of every backoff sleep when all attempts fail.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.retry_count).map(|attempt| self.delay_for(attempt)).sum()
    }
}
