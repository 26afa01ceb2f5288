//! Retry policies
//!
//! The AT command primitive never retries on its own. Callers layer retries
//! with a [`RetryPolicy`]: a bounded number of attempts and a back-off
//! between them, both plain data so they can come from parameters.

/// Delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(u32),
    /// `base * n` after the n-th failed attempt
    Linear(u32),
}

impl Backoff {
    /// Delay in milliseconds after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u8) -> u32 {
        match *self {
            Backoff::Fixed(ms) => ms,
            Backoff::Linear(base) => base.saturating_mul(attempt as u32),
        }
    }
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u8,
    /// Delay between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy; zero attempts is treated as one
    pub const fn new(attempts: u8, backoff: Backoff) -> Self {
        Self {
            attempts: if attempts == 0 { 1 } else { attempts },
            backoff,
        }
    }

    /// Routine location pushes: 3 attempts, 2 s x attempt
    pub const fn routine() -> Self {
        Self::new(3, Backoff::Linear(2_000))
    }

    /// Alert pushes: 5 attempts, 1 s apart
    pub const fn alert() -> Self {
        Self::new(5, Backoff::Fixed(1_000))
    }

    /// Bearer open: 3 attempts, 5 s back-off after each
    pub const fn bearer() -> Self {
        Self::new(3, Backoff::Fixed(5_000))
    }

    /// Attempt numbers, 1-based
    pub fn attempts(&self) -> impl Iterator<Item = u8> {
        1..=self.attempts
    }

    /// Whether `attempt` is the final one
    pub fn is_last(&self, attempt: u8) -> bool {
        attempt >= self.attempts
    }

    /// Delay after failed attempt `attempt`
    pub fn delay_after(&self, attempt: u8) -> u32 {
        self.backoff.delay_after(attempt)
    }

    /// Sum of the delays between attempts (no delay after the last one)
    pub fn total_delay(&self) -> u32 {
        (1..self.attempts).fold(0u32, |acc, n| acc.saturating_add(self.delay_after(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed(1_000);
        assert_eq!(backoff.delay_after(1), 1_000);
        assert_eq!(backoff.delay_after(4), 1_000);
    }

    #[test]
    fn test_linear_backoff_grows() {
        let backoff = Backoff::Linear(2_000);
        assert_eq!(backoff.delay_after(1), 2_000);
        assert_eq!(backoff.delay_after(2), 4_000);
        assert_eq!(backoff.delay_after(3), 6_000);
    }

    #[test]
    fn test_alert_policy_is_more_aggressive() {
        let routine = RetryPolicy::routine();
        let alert = RetryPolicy::alert();
        assert!(alert.attempts > routine.attempts);
        assert!(alert.delay_after(1) < routine.delay_after(1));
        assert_eq!(routine.total_delay(), 2_000 + 4_000);
        assert_eq!(alert.total_delay(), 4 * 1_000);
    }

    #[test]
    fn test_attempt_iteration() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(10));
        let attempts: heapless::Vec<u8, 8> = policy.attempts().collect();
        assert_eq!(attempts.as_slice(), &[1, 2, 3]);
        assert!(!policy.is_last(2));
        assert!(policy.is_last(3));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Backoff::Fixed(10));
        assert_eq!(policy.attempts().count(), 1);
        assert_eq!(policy.total_delay(), 0);
    }
}
