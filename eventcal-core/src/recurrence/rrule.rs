//! RRULE text interop (`FREQ=WEEKLY;INTERVAL=1;COUNT=4`) through the `rrule` crate.
//!
//! Only the rule's text is handled here. Expansion stays in the parent module,
//! which clamps to the month end where RFC 5545 would skip the date.

use chrono::{Duration, NaiveTime, Utc};
use rrule::{Frequency as RruleFrequency, RRule, Unvalidated};
use thiserror::Error;

use super::{Frequency, Limit, RecurrenceRule};
use crate::error::EventCalError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RruleError {
    #[error("unsupported recurrence frequency '{0}'")]
    UnsupportedFrequency(String),

    #[error("malformed recurrence rule: {0}")]
    Malformed(String),
}

impl From<RruleError> for EventCalError {
    fn from(err: RruleError) -> Self {
        EventCalError::Parse(err.to_string())
    }
}

impl RecurrenceRule {
    /// Parse the value of an RRULE property, with or without the `RRULE:` prefix.
    ///
    /// Parts other than FREQ, INTERVAL, UNTIL and COUNT are ignored. When a rule
    /// carries both UNTIL and COUNT, UNTIL wins. A date-only UNTIL covers the
    /// whole of that day.
    pub fn from_rrule(text: &str) -> Result<RecurrenceRule, RruleError> {
        let text = text.trim();
        let text = text.strip_prefix("RRULE:").unwrap_or(text);

        let parsed: RRule<Unvalidated> = text
            .parse::<RRule<Unvalidated>>()
            .map_err(|e| RruleError::Malformed(e.to_string()))?;

        let frequency = match parsed.get_freq() {
            RruleFrequency::Daily => Frequency::Daily,
            RruleFrequency::Weekly => Frequency::Weekly,
            RruleFrequency::Monthly => Frequency::Monthly,
            RruleFrequency::Yearly => Frequency::Yearly,
            other => return Err(RruleError::UnsupportedFrequency(other.to_string())),
        };

        // floating UNTIL values are read as UTC wall time
        let until = parsed.get_until().map(|until| {
            let written = until.naive_local();
            if until_is_date(text) {
                written.date().and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::seconds(1)
            } else {
                written.and_utc()
            }
        });

        let limit = match (until, parsed.get_count()) {
            (Some(until), _) => Limit::Until(until),
            (None, Some(count)) => Limit::Count(count),
            (None, None) => Limit::Unbounded,
        };

        RecurrenceRule::new(frequency, u32::from(parsed.get_interval()), limit)
            .map_err(|e| RruleError::Malformed(e.to_string()))
    }

    /// The rule as an RRULE property value.
    pub fn to_rrule(&self) -> String {
        let frequency = match self.frequency {
            Frequency::Daily => RruleFrequency::Daily,
            Frequency::Weekly => RruleFrequency::Weekly,
            Frequency::Monthly => RruleFrequency::Monthly,
            Frequency::Yearly => RruleFrequency::Yearly,
        };
        // RRULE intervals stop at u16
        let interval = u16::try_from(self.interval).unwrap_or(u16::MAX);

        let rule = RRule::<Unvalidated>::new(frequency).interval(interval);
        let rule = match self.limit {
            Limit::Unbounded => rule,
            Limit::Count(count) => rule.count(count),
            Limit::Until(until) => {
                let tz: rrule::Tz = Utc.into();
                rule.until(until.with_timezone(&tz))
            }
        };
        rule.to_string()
    }
}

/// Whether UNTIL is written as a bare `YYYYMMDD` date.
fn until_is_date(text: &str) -> bool {
    text.split(';')
        .filter_map(|part| part.split_once('='))
        .any(|(key, value)| key.trim().eq_ignore_ascii_case("UNTIL") && value.trim().len() == 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parses_date_only_until_as_end_of_day() {
        let rule = RecurrenceRule::from_rrule("FREQ=DAILY;INTERVAL=1;UNTIL=20090228").unwrap();
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(
            rule.limiting_date(),
            Some(Utc.with_ymd_and_hms(2009, 2, 28, 23, 59, 59).unwrap())
        );
        assert!(rule.active);
    }

    #[test]
    fn test_parses_count_and_defaults_interval() {
        let rule = RecurrenceRule::from_rrule("RRULE:FREQ=WEEKLY;COUNT=4;BYDAY=MO").unwrap();
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.limit, Limit::Count(4));
    }

    #[test]
    fn test_unsupported_frequency_is_distinguishable() {
        let err = RecurrenceRule::from_rrule("FREQ=HOURLY;INTERVAL=2").unwrap_err();
        assert!(matches!(err, RruleError::UnsupportedFrequency(_)));
    }

    #[test]
    fn test_rejects_malformed_parts() {
        assert!(matches!(
            RecurrenceRule::from_rrule("INTERVAL=2"),
            Err(RruleError::Malformed(_))
        ));
        assert!(matches!(
            RecurrenceRule::from_rrule("FREQ=DAILY;INTERVAL=0"),
            Err(RruleError::Malformed(_))
        ));
        assert!(matches!(
            RecurrenceRule::from_rrule("FREQ=DAILY;UNTIL=tomorrow"),
            Err(RruleError::Malformed(_))
        ));
    }

    #[test]
    fn test_to_rrule_reads_back() {
        let until = Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap();
        let rule = RecurrenceRule::new(Frequency::Monthly, 2, Limit::Until(until)).unwrap();
        let text = rule.to_rrule();
        assert!(text.contains("FREQ=MONTHLY"));
        assert!(text.contains("INTERVAL=2"));
        assert_eq!(RecurrenceRule::from_rrule(&text).unwrap(), rule);

        let counted = RecurrenceRule::new(Frequency::Yearly, 1, Limit::Count(5)).unwrap();
        assert_eq!(RecurrenceRule::from_rrule(&counted.to_rrule()).unwrap(), counted);
    }

    #[test]
    fn test_utc_until_keeps_its_time() {
        let rule = RecurrenceRule::from_rrule("FREQ=WEEKLY;UNTIL=20240630T180000Z").unwrap();
        assert_eq!(
            rule.limiting_date(),
            Some(Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap())
        );
    }
}
