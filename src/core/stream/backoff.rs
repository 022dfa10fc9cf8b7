//! Reconnection backoff schedule.

use std::time::Duration;

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff for stream reconnects: 1s doubling to a 60s cap,
/// reset once a connection proves healthy.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    delay: Duration,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self {
            delay: INITIAL_DELAY,
        }
    }

    /// Delay to sleep before the next attempt; doubles the stored delay
    /// up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(MAX_DELAY);
        delay
    }

    /// Back to the initial delay after a healthy connection.
    pub fn reset(&mut self) {
        self.delay = INITIAL_DELAY;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_the_cap() {
        let mut backoff = ReconnectBackoff::new();
        let observed: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(observed, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn delay_after_n_failures_is_min_pow2_60() {
        for n in 0..10u32 {
            let mut backoff = ReconnectBackoff::new();
            let mut last = Duration::ZERO;
            for _ in 0..=n {
                last = backoff.next_delay();
            }
            assert_eq!(last.as_secs(), 2u64.pow(n).min(60));
        }
    }

    #[test]
    fn reset_returns_to_one_second() {
        let mut backoff = ReconnectBackoff::new();
        for _ in 0..4 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
