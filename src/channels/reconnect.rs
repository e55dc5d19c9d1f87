//! Backoff policy for channel reconnects.

use std::time::Duration;

/// Exponential-backoff retry policy for a failed channel.
///
/// `max_delay` is `None` by default: the upstream behavior grows the
/// delay without bound (attempt 10 is already ~17 minutes). Deployments
/// that want a ceiling can set a clamp without changing the growth law.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before the channel is torn down.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Optional ceiling on the computed delay.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based):
    /// `base * 2^(attempt-1)`, clamped if a ceiling is configured.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn clamp_caps_growth() {
        let policy = RetryPolicy {
            max_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn unclamped_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10), Duration::from_secs(512));
    }
}
