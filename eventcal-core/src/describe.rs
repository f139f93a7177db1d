//! Human-readable descriptions of rules and periods.
//!
//! Kept apart from the value types so display wording can change without
//! touching the data they describe.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};

use crate::period::CalendarPeriod;
use crate::recurrence::{Limit, RecurrenceRule};

const DATE_FORMAT: &str = "%-d %B %Y";

/// "weekly until 24 February 2009", "every 2 months, 12 times", "daily, indefinitely".
pub fn describe_rule(rule: &RecurrenceRule) -> String {
    let cadence = if rule.interval == 1 {
        rule.frequency.adverb().to_string()
    } else {
        format!("every {} {}s", rule.interval, rule.frequency.unit())
    };

    match rule.limit {
        Limit::Unbounded => format!("{cadence}, indefinitely"),
        Limit::Count(1) => format!("{cadence}, once"),
        Limit::Count(n) => format!("{cadence}, {n} times"),
        Limit::Until(until) => format!("{cadence} until {}", until.format(DATE_FORMAT)),
    }
}

/// "on 3 May 2024", "in March 2024", "from 3 May 2024 onward", ...
///
/// A finish on midnight is exclusive, so the day before it is shown.
pub fn describe_period(period: &CalendarPeriod) -> String {
    match (period.start, period.finish) {
        (Some(start), Some(finish)) => describe_bounded(start, finish),
        (Some(start), None) => format!("from {} onward", start.format(DATE_FORMAT)),
        (None, Some(finish)) => format!("until {}", last_day(finish).format(DATE_FORMAT)),
        (None, None) => "at any time".to_string(),
    }
}

fn describe_bounded(start: DateTime<Utc>, finish: DateTime<Utc>) -> String {
    if is_midnight(start) {
        if finish == start + Duration::days(1) {
            return format!("on {}", start.format(DATE_FORMAT));
        }
        if start.day() == 1 {
            if start.month() == 1 && start.checked_add_months(Months::new(12)) == Some(finish) {
                return format!("in {}", start.year());
            }
            if start.checked_add_months(Months::new(1)) == Some(finish) {
                return format!("in {}", start.format("%B %Y"));
            }
        }
    }

    let last = last_day(finish);
    if last.date_naive() == start.date_naive() {
        return format!("on {}", start.format(DATE_FORMAT));
    }
    format!(
        "between {} and {}",
        start.format(DATE_FORMAT),
        last.format(DATE_FORMAT)
    )
}

fn last_day(finish: DateTime<Utc>) -> DateTime<Utc> {
    if is_midnight(finish) {
        finish - Duration::days(1)
    } else {
        finish
    }
}

fn is_midnight(instant: DateTime<Utc>) -> bool {
    instant.time() == NaiveTime::MIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Frequency;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_describe_rule() {
        let weekly = RecurrenceRule::new(Frequency::Weekly, 1, Limit::Until(utc(2009, 2, 24))).unwrap();
        assert_eq!(describe_rule(&weekly), "weekly until 24 February 2009");

        let counted = RecurrenceRule::new(Frequency::Monthly, 2, Limit::Count(12)).unwrap();
        assert_eq!(describe_rule(&counted), "every 2 months, 12 times");

        let open = RecurrenceRule::new(Frequency::Daily, 2, Limit::Unbounded).unwrap();
        assert_eq!(describe_rule(&open), "every 2 days, indefinitely");

        let daily = RecurrenceRule::new(Frequency::Daily, 1, Limit::Unbounded).unwrap();
        assert_eq!(describe_rule(&daily), "daily, indefinitely");
    }

    #[test]
    fn test_describe_named_periods() {
        let day = CalendarPeriod::on_day(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert_eq!(describe_period(&day), "on 3 May 2024");
        assert_eq!(describe_period(&CalendarPeriod::in_month(2024, 3).unwrap()), "in March 2024");
        assert_eq!(describe_period(&CalendarPeriod::in_year(2024).unwrap()), "in 2024");
    }

    #[test]
    fn test_describe_open_and_arbitrary_periods() {
        assert_eq!(
            describe_period(&CalendarPeriod::from(utc(2024, 5, 3))),
            "from 3 May 2024 onward"
        );
        assert_eq!(
            describe_period(&CalendarPeriod::until(utc(2024, 5, 4))),
            "until 3 May 2024"
        );
        let range = CalendarPeriod::between(utc(2024, 5, 3), utc(2024, 6, 6)).unwrap();
        assert_eq!(describe_period(&range), "between 3 May 2024 and 5 June 2024");
    }
}
