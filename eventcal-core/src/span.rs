//! The time an event occupies.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventCalError, EventCalResult};

/// Start instant, optional end instant and an all-day flag.
///
/// A span without an end is a point in time (or an "ongoing" event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
}

impl TimeSpan {
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        all_day: bool,
    ) -> EventCalResult<Self> {
        if let Some(end) = end {
            if end < start {
                return Err(EventCalError::Validation(format!(
                    "end {} is before start {}",
                    end.to_rfc3339(),
                    start.to_rfc3339()
                )));
            }
        }
        Ok(TimeSpan {
            start,
            end,
            all_day,
        })
    }

    /// A point-in-time span.
    pub fn at(start: DateTime<Utc>) -> Self {
        TimeSpan {
            start,
            end: None,
            all_day: false,
        }
    }

    /// Midnight to midnight on `date`.
    pub fn all_day_on(date: NaiveDate) -> Self {
        let start = midnight(date);
        TimeSpan {
            start,
            end: Some(start + Duration::days(1)),
            all_day: true,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.map(|end| end - self.start).unwrap_or_else(Duration::zero)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end.map(|end| end.date_naive())
    }

    /// Move both bounds by `delta`.
    pub fn shift(&self, delta: Duration) -> Self {
        TimeSpan {
            start: self.start + delta,
            end: self.end.map(|end| end + delta),
            all_day: self.all_day,
        }
    }

    /// The same span starting at `start`: duration and all-day flag are kept.
    pub fn shifted_to(&self, start: DateTime<Utc>) -> Self {
        self.shift(start - self.start)
    }

    /// Both bounds sit on midnight and the span covers at most one calendar day.
    pub fn is_all_day(&self) -> bool {
        if !is_midnight(self.start) {
            return false;
        }
        match self.end {
            None => true,
            Some(end) => {
                is_midnight(end)
                    && (end == self.start + Duration::days(1) || end.date_naive() == self.start_date())
            }
        }
    }

    /// Whether the span fits on one calendar day for display purposes.
    ///
    /// A midnight-to-midnight span counts as a single day.
    pub fn within_single_day(&self) -> bool {
        match self.end {
            None => true,
            Some(end) => end.date_naive() == self.start_date() || end == self.start + Duration::days(1),
        }
    }

    /// Whether the span intersects `[range_start, range_end)`.
    ///
    /// An end-less span is a zero-duration point: it overlaps only ranges containing it.
    pub fn overlaps(&self, range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> bool {
        match self.end {
            Some(end) => self.start < range_end && end > range_start,
            None => self.start >= range_start && self.start < range_end,
        }
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        match self.end {
            Some(end) => self.start <= instant && instant < end,
            None => self.start <= instant,
        }
    }
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn is_midnight(instant: DateTime<Utc>) -> bool {
    instant.time() == NaiveTime::MIN
}
