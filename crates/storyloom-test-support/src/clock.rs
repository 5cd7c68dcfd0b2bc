//! Test clock — deterministic `Clock` implementation for tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use storyloom_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The instant most tests pin "now" to: 2026-01-15 10:00:00 UTC.
    ///
    /// # Panics
    ///
    /// Never in practice; the date literal is valid.
    #[must_use]
    pub fn standard() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    /// Returns a clock advanced by the given number of hours.
    #[must_use]
    pub fn plus_hours(self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
