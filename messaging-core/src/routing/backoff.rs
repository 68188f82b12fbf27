//! Retry delay policy for recoverable transmit failures.

use crate::config::RouterConfig;
use std::time::Duration;

/// Lower bound for computed backoff.
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    send_msg_retry_interval: Duration,
    max_retry_delay: Duration,
    max_retry_count: Option<u32>,
}

impl RetryPolicy {
    pub fn new(
        send_msg_retry_interval: Duration,
        max_retry_delay: Duration,
        max_retry_count: Option<u32>,
    ) -> Self {
        Self {
            send_msg_retry_interval,
            max_retry_delay,
            max_retry_count,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            Duration::from_millis(config.send_msg_retry_interval_ms),
            Duration::from_millis(config.max_retry_delay_ms),
            config.max_retry_count,
        )
    }

    /// Delay before retry number `retries + 1`.
    ///
    /// A delay supplied by the transport is used as is; otherwise the delay grows as
    /// `2^retries * send_msg_retry_interval`, capped at `max_retry_delay`.
    pub fn delay_for(&self, retries: u32, transport_delay: Option<Duration>) -> Duration {
        if let Some(delay) = transport_delay {
            return delay;
        }
        let factor = 2u32.checked_pow(retries).unwrap_or(u32::MAX);
        self.send_msg_retry_interval
            .saturating_mul(factor)
            .min(self.max_retry_delay)
            .max(MIN_RETRY_DELAY)
    }

    /// `true` once `retries` already performed leave no retry allowed.
    pub fn is_exhausted(&self, retries: u32) -> bool {
        self.max_retry_count
            .map_or(false, |max_retry_count| retries >= max_retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use std::time::Duration;

    fn policy(max_retry_count: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            max_retry_count,
        )
    }

    #[test]
    fn delay_grows_exponentially_up_to_cap() {
        let policy = policy(None);

        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(64, None), Duration::from_millis(1_000));
    }

    #[test]
    fn computed_delay_never_drops_to_zero() {
        let policy = RetryPolicy::new(Duration::ZERO, Duration::ZERO, None);

        assert_eq!(policy.delay_for(0, None), Duration::from_millis(1));
        assert_eq!(policy.delay_for(10, None), Duration::from_millis(1));
    }

    #[test]
    fn transport_delay_takes_precedence() {
        let policy = policy(None);

        assert_eq!(
            policy.delay_for(5, Some(Duration::from_millis(7))),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn retry_cap_is_optional() {
        assert!(!policy(None).is_exhausted(u32::MAX));

        let capped = policy(Some(2));
        assert!(!capped.is_exhausted(1));
        assert!(capped.is_exhausted(2));
    }
}
