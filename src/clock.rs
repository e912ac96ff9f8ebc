//! Time source used by the lockout policy.
//!
//! Production code reads the system clock; tests drive a [`ManualClock`] so
//! the lockout window can be crossed without sleeping.

use std::fmt::Debug;

use time::OffsetDateTime;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::default();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::seconds(301));
        assert_eq!(clock.now() - t0, Duration::seconds(301));
    }
}
