//! Cache Duration Module
//!
//! Validity spans expressed as independent components and normalized into one
//! `TimeDelta`.

use chrono::TimeDelta;

use crate::error::{CacheError, Result};

// == Cache Duration ==
/// How long a memoized result stays fresh.
///
/// Components are summed as-is, so `seconds(90).minutes(-1)` is thirty seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDuration {
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub milliseconds: i64,
    pub microseconds: i64,
}

impl CacheDuration {
    /// Creates a zero duration. Results cached with it are never reused.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self::new().seconds(seconds)
    }

    /// Converts a `std::time::Duration`, keeping microsecond precision.
    pub fn from_std(duration: std::time::Duration) -> Result<Self> {
        let micros = i64::try_from(duration.as_micros()).map_err(|_| {
            CacheError::InvalidDuration(format!("{duration:?} does not fit in microseconds"))
        })?;
        Ok(Self::new().microseconds(micros))
    }

    pub fn weeks(mut self, weeks: i64) -> Self {
        self.weeks = weeks;
        self
    }

    pub fn days(mut self, days: i64) -> Self {
        self.days = days;
        self
    }

    pub fn hours(mut self, hours: i64) -> Self {
        self.hours = hours;
        self
    }

    pub fn minutes(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn seconds(mut self, seconds: i64) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn milliseconds(mut self, milliseconds: i64) -> Self {
        self.milliseconds = milliseconds;
        self
    }

    pub fn microseconds(mut self, microseconds: i64) -> Self {
        self.microseconds = microseconds;
        self
    }

    // == Normalize ==
    /// Sums every component into a single span.
    ///
    /// # Errors
    /// `InvalidDuration` when the total is negative, any component overflows,
    /// or the total cannot be stored as whole microseconds.
    pub fn normalize(&self) -> Result<TimeDelta> {
        let parts = [
            ("weeks", TimeDelta::try_weeks(self.weeks)),
            ("days", TimeDelta::try_days(self.days)),
            ("hours", TimeDelta::try_hours(self.hours)),
            ("minutes", TimeDelta::try_minutes(self.minutes)),
            ("seconds", TimeDelta::try_seconds(self.seconds)),
            ("milliseconds", TimeDelta::try_milliseconds(self.milliseconds)),
            ("microseconds", Some(TimeDelta::microseconds(self.microseconds))),
        ];

        let mut total = TimeDelta::zero();
        for (name, part) in parts {
            total = part
                .and_then(|p| total.checked_add(&p))
                .ok_or_else(|| CacheError::InvalidDuration(format!("{name} out of range")))?;
        }

        if total.num_microseconds().is_none() {
            return Err(CacheError::InvalidDuration(format!(
                "{total} exceeds the persistable range of i64 microseconds"
            )));
        }

        if total < TimeDelta::zero() {
            return Err(CacheError::InvalidDuration(format!(
                "cache duration must be zero or greater, got {total}"
            )));
        }
        Ok(total)
    }
}
