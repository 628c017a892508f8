//! Exponential backoff as a small state machine.
//!
//! The call loop in the application crate owns the timers; this module only
//! decides *whether* to retry and *how long* to wait, so the schedule can be
//! tested without sleeping.
//!
//! ```rust
//! use std::time::Duration;
//! use cellar_search_core::backoff::{backoff_duration, RetryDecision, RetryState};
//!
//! assert_eq!(backoff_duration(Duration::from_millis(100), 2), Duration::from_millis(400));
//!
//! let mut state: RetryState<&str> = RetryState::new(1, Duration::from_millis(100));
//! assert_eq!(state.fail("503"), RetryDecision::RetryAfter(Duration::from_millis(100)));
//! assert_eq!(state.fail("503"), RetryDecision::GiveUp);
//! assert_eq!(state.into_last_error(), Some("503"));
//! ```

use std::time::Duration;

/// Delay before the retry that follows attempt `attempt` (0-indexed):
/// `base × 2^attempt`, saturating instead of overflowing.
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX)
}

/// What the caller should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// `{attempt, last_error, next_delay}` for one retry sequence.
///
/// `retries` is the number of *extra* attempts, so a sequence makes at most
/// `retries + 1` calls.
#[derive(Debug)]
pub struct RetryState<E> {
    attempt: u32,
    retries: u32,
    base: Duration,
    last_error: Option<E>,
}

impl<E> RetryState<E> {
    pub fn new(retries: u32, base: Duration) -> Self {
        Self {
            attempt: 0,
            retries,
            base,
            last_error: None,
        }
    }

    /// Index of the attempt about to be made (or just made).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.retries
    }

    /// Delay that would follow the current attempt, if one remains.
    pub fn next_delay(&self) -> Option<Duration> {
        self.has_attempts_left()
            .then(|| backoff_duration(self.base, self.attempt))
    }

    /// Record a failure for the current attempt and advance.
    pub fn fail(&mut self, err: E) -> RetryDecision {
        self.last_error = Some(err);
        match self.next_delay() {
            Some(delay) => {
                self.attempt += 1;
                RetryDecision::RetryAfter(delay)
            }
            None => RetryDecision::GiveUp,
        }
    }

    pub fn last_error(&self) -> Option<&E> {
        self.last_error.as_ref()
    }

    pub fn into_last_error(self) -> Option<E> {
        self.last_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_duration(base, 0), Duration::from_millis(250));
        assert_eq!(backoff_duration(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_duration(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_duration(base, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_zero_base() {
        assert_eq!(backoff_duration(Duration::ZERO, 5), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates() {
        let d = backoff_duration(Duration::from_secs(u64::MAX / 2), 40);
        assert_eq!(d, Duration::MAX);
    }

    #[test]
    fn test_state_makes_retries_plus_one_attempts() {
        let mut state: RetryState<u16> = RetryState::new(2, Duration::from_millis(10));
        let mut calls = 1;
        while let RetryDecision::RetryAfter(_) = state.fail(503) {
            calls += 1;
        }
        assert_eq!(calls, 3);
        assert_eq!(state.last_error(), Some(&503));
    }

    #[test]
    fn test_state_schedule() {
        let mut state: RetryState<()> = RetryState::new(3, Duration::from_millis(100));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(
            state.fail(()),
            RetryDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            state.fail(()),
            RetryDecision::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(
            state.fail(()),
            RetryDecision::RetryAfter(Duration::from_millis(400))
        );
        assert_eq!(state.next_delay(), None);
        assert_eq!(state.fail(()), RetryDecision::GiveUp);
        assert_eq!(state.attempt(), 3);
    }

    #[test]
    fn test_zero_retries_gives_up_immediately() {
        let mut state: RetryState<&str> = RetryState::new(0, Duration::from_secs(1));
        assert!(!state.has_attempts_left());
        assert_eq!(state.fail("boom"), RetryDecision::GiveUp);
    }

    proptest! {
        #[test]
        fn prop_backoff_monotonic(base_ms in 0u64..10_000, attempt in 0u32..40) {
            let base = Duration::from_millis(base_ms);
            prop_assert!(backoff_duration(base, attempt + 1) >= backoff_duration(base, attempt));
        }

        #[test]
        fn prop_attempts_bounded(retries in 0u32..20) {
            let mut state: RetryState<()> = RetryState::new(retries, Duration::ZERO);
            let mut calls = 1u32;
            while let RetryDecision::RetryAfter(_) = state.fail(()) {
                calls += 1;
            }
            prop_assert_eq!(calls, retries + 1);
        }
    }
}
