//! Parsing dates given on the command line. All times are read as UTC.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use eventcal_core::CalendarPeriod;

/// Days listed ahead when no end date is given.
pub const DEFAULT_LIST_DAYS: i64 = 365;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// A date or a moment, as typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Date(NaiveDate),
    Time(DateTime<Utc>),
}

impl When {
    pub fn instant(self) -> DateTime<Utc> {
        match self {
            When::Date(date) => start_of_day(date),
            When::Time(instant) => instant,
        }
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
}

pub fn parse_when(s: &str) -> Result<When> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(When::Time(instant.with_timezone(&Utc)));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(When::Time(naive.and_utc()));
        }
    }
    parse_date(s)
        .map(When::Date)
        .map_err(|_| anyhow!("Could not parse date/time: \"{}\"", s))
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// The period `--from` / `--to` select.
///
/// `from` is "start" for an unbounded past and defaults to today. `to` is
/// inclusive and defaults to a year after `from`.
pub fn period_from_args(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CalendarPeriod> {
    let start = match from {
        Some("start") => None,
        Some(s) => Some(start_of_day(parse_date(s)?)),
        None => Some(start_of_day(now.date_naive())),
    };

    let finish = match to {
        Some(s) => start_of_day(parse_date(s)?) + Duration::days(1),
        None => start.unwrap_or(now) + Duration::days(DEFAULT_LIST_DAYS),
    };

    match start {
        Some(start) => Ok(CalendarPeriod::between(start, finish)?),
        None => Ok(CalendarPeriod::until(finish)),
    }
}
