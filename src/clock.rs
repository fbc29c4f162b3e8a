//! Wall-clock and monotonic time as an external collaborator (spec §6): the
//! core never reads the system clock directly, so vote timestamps and save
//! timestamps stay reproducible in tests.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// External collaborator providing the two clock readings the core needs:
/// a wall-clock timestamp for vote messages and tower saves, and a
/// monotonic duration for timing decisions that must not jump backward.
/// Mirrors [`crate::tower::tower_bft::IdentitySigner`]'s shape — an
/// injectable trait at the one seam where the core would otherwise reach
/// for global, untestable state.
pub trait ClockSource {
    fn now_unix_seconds(&self) -> i64;
    fn now_monotonic_ns(&self) -> u128;
}

/// The real system clock, used by the binary entry point.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_unix_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn now_monotonic_ns(&self) -> u128 {
        let start = PROCESS_START.get_or_init(Instant::now);
        start.elapsed().as_nanos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock {
        unix_seconds: i64,
    }

    impl ClockSource for FixedClock {
        fn now_unix_seconds(&self) -> i64 {
            self.unix_seconds
        }
        fn now_monotonic_ns(&self) -> u128 {
            0
        }
    }

    #[test]
    fn fixed_clock_is_injectable_for_deterministic_tests() {
        let clock = FixedClock { unix_seconds: 1_234_567_890 };
        assert_eq!(clock.now_unix_seconds(), 1_234_567_890);
    }

    #[test]
    fn system_clock_returns_a_plausible_unix_timestamp() {
        let clock = SystemClock;
        assert!(clock.now_unix_seconds() > 1_700_000_000);
    }
}
