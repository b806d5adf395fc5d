use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::config::PollConfig;

/// Sleep schedule between result polls.
///
/// With the default multiplier of 1.0 every sleep equals the configured interval.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    max_attempts: Option<u32>,
}

impl RetryStrategy {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            interval: config.interval,
            max_interval: config.max_interval.max(config.interval),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts,
        }
    }

    pub fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Delay before the next attempt; falls back to the ceiling if the backoff gives up.
    pub fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        backoff.next_backoff().unwrap_or(self.max_interval)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_config(
        interval_ms: u64,
        max_ms: u64,
        multiplier: f64,
        max_attempts: Option<u32>,
    ) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(interval_ms),
            max_interval: Duration::from_millis(max_ms),
            multiplier,
            max_attempts,
        }
    }

    #[test]
    fn test_fixed_interval() {
        let strategy = RetryStrategy::new(&poll_config(100, 30_000, 1.0, None));
        let mut backoff = strategy.create_backoff();
        for _ in 0..5 {
            assert_eq!(strategy.next_delay(&mut backoff), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_growing_interval_is_capped() {
        let strategy = RetryStrategy::new(&poll_config(100, 350, 2.0, None));
        let mut backoff = strategy.create_backoff();
        let delays: Vec<Duration> = (0..4).map(|_| strategy.next_delay(&mut backoff)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(350),
                Duration::from_millis(350),
            ]
        );
    }

    #[test]
    fn test_should_retry() {
        let strategy = RetryStrategy::new(&poll_config(10, 10, 1.0, Some(3)));
        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(2));
        assert!(!strategy.should_retry(3));

        let unbounded = RetryStrategy::new(&poll_config(10, 10, 1.0, None));
        assert!(unbounded.should_retry(u32::MAX));
    }
}
