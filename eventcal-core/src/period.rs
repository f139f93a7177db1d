//! Calendar periods for filtering and describing ranges of time.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EventCalError, EventCalResult};
use crate::span::midnight;

/// A stretch of time, open at either end but never at both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPeriod {
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
}

impl CalendarPeriod {
    pub fn between(start: DateTime<Utc>, finish: DateTime<Utc>) -> EventCalResult<Self> {
        if finish < start {
            return Err(EventCalError::Validation(format!(
                "period finish {} is before its start {}",
                finish.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(CalendarPeriod {
            start: Some(start),
            finish: Some(finish),
        })
    }

    /// Everything from `start` onward.
    pub fn from(start: DateTime<Utc>) -> Self {
        CalendarPeriod {
            start: Some(start),
            finish: None,
        }
    }

    /// Everything up to `finish`.
    pub fn until(finish: DateTime<Utc>) -> Self {
        CalendarPeriod {
            start: None,
            finish: Some(finish),
        }
    }

    pub fn on_day(date: NaiveDate) -> Self {
        let start = midnight(date);
        CalendarPeriod {
            start: Some(start),
            finish: Some(start + Duration::days(1)),
        }
    }

    /// The ISO (commercial) week `week` of `iso_year`.
    pub fn in_week(iso_year: i32, week: u32) -> EventCalResult<Self> {
        let monday = NaiveDate::from_isoywd_opt(iso_year, week, Weekday::Mon).ok_or_else(|| {
            EventCalError::Validation(format!("no week {week} in {iso_year}"))
        })?;
        let start = midnight(monday);
        Ok(CalendarPeriod {
            start: Some(start),
            finish: Some(start + Duration::weeks(1)),
        })
    }

    pub fn in_month(year: i32, month: u32) -> EventCalResult<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| EventCalError::Validation(format!("no month {month} in {year}")))?;
        let start = midnight(first);
        Ok(CalendarPeriod {
            start: Some(start),
            finish: start.checked_add_months(Months::new(1)),
        })
    }

    pub fn in_year(year: i32) -> EventCalResult<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| EventCalError::Validation(format!("year {year} is out of range")))?;
        let start = midnight(first);
        Ok(CalendarPeriod {
            start: Some(start),
            finish: start.checked_add_months(Months::new(12)),
        })
    }

    /// The next `length` of time from `now`.
    pub fn within(now: DateTime<Utc>, length: Duration) -> Self {
        CalendarPeriod {
            start: Some(now),
            finish: Some(now + length),
        }
    }

    /// The last `length` of time up to `now`.
    pub fn in_the_last(now: DateTime<Utc>, length: Duration) -> Self {
        CalendarPeriod {
            start: Some(now - length),
            finish: Some(now),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.finish.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.finish? - self.start?)
    }

    pub fn shift(&self, delta: Duration) -> Self {
        CalendarPeriod {
            start: self.start.map(|s| s + delta),
            finish: self.finish.map(|f| f + delta),
        }
    }

    /// Push the finish out by `delta`. Open-ended periods are unchanged.
    pub fn extend(&self, delta: Duration) -> Self {
        CalendarPeriod {
            start: self.start,
            finish: self.finish.map(|f| f + delta),
        }
    }

    /// Widen the period to whole calendar months.
    pub fn pad_to_months(&self) -> Self {
        let start = self
            .start
            .and_then(|s| s.date_naive().with_day(1))
            .map(midnight);
        let finish = self.finish.map(|f| {
            let date = f.date_naive();
            let first = date.with_day(1).unwrap_or(date);
            let padded = midnight(first);
            if padded == f {
                padded
            } else {
                padded.checked_add_months(Months::new(1)).unwrap_or(f)
            }
        });
        CalendarPeriod { start, finish }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| s <= instant) && self.finish.is_none_or(|f| instant < f)
    }

    /// Bounds with open ends replaced by the extremes of representable time.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.finish.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}
