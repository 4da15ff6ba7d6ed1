use crate::app::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff for one batch exchange.
///
/// Attempt `n` (zero based) waits `min_backoff * 2^n`, capped at `max_backoff`.
/// A batch is sent at most `max_retry + 1` times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retry: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retry: config.max_retry,
            min_backoff: config.min_backoff,
            max_backoff: config.max_backoff,
            jitter: config.jitter,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retry.saturating_add(1)
    }

    /// True once `attempts` sends have been made and none may follow.
    pub fn should_give_up(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts()
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let base_delay = self
            .min_backoff
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff);

        let capped_delay = std::cmp::min(base_delay, self.max_backoff);

        if self.jitter {
            self.apply_jitter(capped_delay)
        } else {
            capped_delay
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
        let jittered = delay.mul_f64(jitter_factor);
        std::cmp::min(jittered, self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
