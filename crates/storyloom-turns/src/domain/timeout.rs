//! Phase timeouts.
//!
//! The engine only reports whether a phase has run past its limit; acting on
//! an expired phase (for example by skipping it) is left to the host.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::phase::GamePhase;
use super::settings::{NO_TIME_LIMIT, PhaseTimeouts};

/// When a phase started that has `timeout_hours` to run expires, if ever.
#[must_use]
pub fn deadline(phase_started_at: DateTime<Utc>, timeout_hours: i32) -> Option<DateTime<Utc>> {
    if timeout_hours == NO_TIME_LIMIT {
        return None;
    }
    Some(phase_started_at + Duration::hours(i64::from(timeout_hours)))
}

/// Whether the phase has expired at `now`.
#[must_use]
pub fn is_expired(phase_started_at: DateTime<Utc>, timeout_hours: i32, now: DateTime<Utc>) -> bool {
    deadline(phase_started_at, timeout_hours).is_some_and(|d| now >= d)
}

/// Timeout state of the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeoutStatus {
    pub phase: GamePhase,
    pub phase_started_at: DateTime<Utc>,
    pub timeout_hours: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub expired: bool,
}

impl TimeoutStatus {
    #[must_use]
    pub fn evaluate(
        phase: GamePhase,
        phase_started_at: DateTime<Utc>,
        timeouts: &PhaseTimeouts,
        now: DateTime<Utc>,
    ) -> Self {
        let timeout_hours = timeouts.hours_for(phase);
        Self {
            phase,
            phase_started_at,
            timeout_hours,
            deadline: deadline(phase_started_at, timeout_hours),
            expired: is_expired(phase_started_at, timeout_hours, now),
        }
    }
}
