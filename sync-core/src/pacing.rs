//! Pacing computation for subscribers.
//!
//! A pacing policy maps a decoded payload to a target inter-request delay.
//! After a response arrives, the subscriber sleeps for whatever is left of
//! that target; trivially small remainders are skipped so the subscriber
//! never schedules a sleep shorter than the minimum.

use std::sync::Arc;
use std::time::Duration;

/// Sleeps shorter than this are not worth scheduling.
pub const DEFAULT_MIN_SLEEP: Duration = Duration::from_millis(10);

/// Maps a decoded value to the target delay before the next request.
pub type PacingPolicy<V> = Arc<dyn Fn(&V) -> Duration + Send + Sync>;

/// A policy that always returns the same target delay.
pub fn fixed<V>(delay: Duration) -> PacingPolicy<V> {
    Arc::new(move |_| delay)
}

/// How long to sleep before the next request, if at all.
///
/// Returns `Some(target - elapsed)` when the remainder exceeds `min_sleep`,
/// `None` when the response already took as long as the target (or longer)
/// or the remainder is too small to bother with.
pub fn compute_sleep(target: Duration, elapsed: Duration, min_sleep: Duration) -> Option<Duration> {
    let remaining = target.checked_sub(elapsed)?;
    if remaining > min_sleep {
        Some(remaining)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn sleeps_for_remainder_of_target() {
        // 200ms target, response arrived after 50ms -> sleep ~150ms
        assert_eq!(compute_sleep(ms(200), ms(50), DEFAULT_MIN_SLEEP), Some(ms(150)));
    }

    #[test]
    fn no_sleep_when_response_was_slower_than_target() {
        // 200ms target, response took 250ms -> re-request immediately
        assert_eq!(compute_sleep(ms(200), ms(250), DEFAULT_MIN_SLEEP), None);
    }

    #[test]
    fn no_sleep_for_trivially_small_remainder() {
        assert_eq!(compute_sleep(ms(200), ms(195), DEFAULT_MIN_SLEEP), None);
        // Exactly the minimum is still skipped; it must be exceeded
        assert_eq!(compute_sleep(ms(210), ms(200), DEFAULT_MIN_SLEEP), None);
        assert_eq!(compute_sleep(ms(211), ms(200), DEFAULT_MIN_SLEEP), Some(ms(11)));
    }

    #[test]
    fn zero_target_never_sleeps() {
        assert_eq!(compute_sleep(ms(0), ms(0), DEFAULT_MIN_SLEEP), None);
    }

    #[test]
    fn fixed_policy_ignores_value() {
        let policy = fixed::<u32>(ms(75));
        assert_eq!(policy(&1), ms(75));
        assert_eq!(policy(&99), ms(75));
    }
}
