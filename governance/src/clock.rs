//! Time source abstraction.
//!
//! Every component reads "now" through an injected [`Clock`] so that expiry,
//! recency windows and audit schedules can be driven deterministically.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulation hosts.
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Create a clock frozen at the current system time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Set the clock to an explicit instant.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Longest duration, frequency or window accepted anywhere (about 114 years).
pub const MAX_DURATION_HOURS: f64 = 1_000_000.0;

/// Convert fractional hours into a chrono duration (millisecond precision).
///
/// `None` for non-finite values or magnitudes beyond [`MAX_DURATION_HOURS`].
pub(crate) fn hours(h: f64) -> Option<Duration> {
    if !h.is_finite() || h.abs() > MAX_DURATION_HOURS {
        return None;
    }
    Duration::try_milliseconds((h * 3_600_000.0).round() as i64)
}

/// `at + h` hours, or `None` when out of range.
pub(crate) fn add_hours(at: DateTime<Utc>, h: f64) -> Option<DateTime<Utc>> {
    hours(h).and_then(|d| at.checked_add_signed(d))
}

/// `at - h` hours, or `None` when out of range.
pub(crate) fn sub_hours(at: DateTime<Utc>, h: f64) -> Option<DateTime<Utc>> {
    hours(h).and_then(|d| at.checked_sub_signed(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance_is_shared() {
        let clock = ManualClock::starting_now();
        let shared = clock.clone();
        let start = clock.now();

        shared.advance(Duration::minutes(5));

        assert_eq!(clock.now() - start, Duration::minutes(5));
    }

    #[test]
    fn test_fractional_hours() {
        assert_eq!(hours(1.5), Some(Duration::minutes(90)));
        assert_eq!(hours(0.0), Some(Duration::zero()));
    }

    #[test]
    fn test_out_of_range_hours() {
        let now = Utc::now();
        assert_eq!(hours(1e12), None);
        assert_eq!(hours(f64::INFINITY), None);
        assert_eq!(add_hours(now, 1e12), None);
        assert_eq!(sub_hours(now, f64::NAN), None);
        assert_eq!(add_hours(now, 2.0), Some(now + Duration::hours(2)));
        assert!(add_hours(now, MAX_DURATION_HOURS).is_some());
    }
}
