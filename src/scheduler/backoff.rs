//! Throttling backoff policy

use std::time::Duration;

/// Exponent ceiling so large retry counts cannot overflow
const MAX_EXPONENT: u32 = 16;

/// `initial * 2^retries`
pub fn backoff_delay(initial: Duration, retries: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(retries.min(MAX_EXPONENT));
    initial.saturating_mul(multiplier)
}

/// What the lane does with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue at the head, not before the given delay
    Retry(Duration),
    /// Retry budget spent
    GiveUp,
}

pub fn decide(initial: Duration, retries_so_far: u32, max_retries: u32) -> RetryDecision {
    if retries_so_far >= max_retries {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Retry(backoff_delay(initial, retries_so_far))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling() {
        let base = Duration::from_millis(2000);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(4000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(16000));
    }

    #[test]
    fn test_huge_retry_count_saturates() {
        let delay = backoff_delay(Duration::from_millis(1), 500);
        assert_eq!(delay, Duration::from_millis(65536));
    }

    #[test]
    fn test_decide() {
        let base = Duration::from_millis(100);
        assert_eq!(decide(base, 0, 3), RetryDecision::Retry(base));
        assert_eq!(decide(base, 2, 3), RetryDecision::Retry(base * 4));
        assert_eq!(decide(base, 3, 3), RetryDecision::GiveUp);
        assert_eq!(decide(base, 0, 0), RetryDecision::GiveUp);
    }
}
