use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use eventcal_core::describe::describe_rule;
use eventcal_core::venue::resolve_location;
use eventcal_core::{Calendar, EventStatus, Frequency, Limit, NewEvent, RecurrenceRule, TimeSpan};
use owo_colors::OwoColorize;

use crate::App;
use crate::render::{Render, render_span};
use crate::utils::dates::{When, parse_date, parse_when, start_of_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Repeat {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<Repeat> for Frequency {
    fn from(repeat: Repeat) -> Self {
        match repeat {
            Repeat::Daily => Frequency::Daily,
            Repeat::Weekly => Frequency::Weekly,
            Repeat::Monthly => Frequency::Monthly,
            Repeat::Yearly => Frequency::Yearly,
        }
    }
}

pub struct NewArgs {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub publish: bool,
    pub repeat: Option<Repeat>,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<String>,
}

pub fn run(app: &App, calendar: Calendar, args: NewArgs) -> Result<()> {
    let span = build_span(&args.start, args.end.as_deref(), args.all_day)?;
    let rule = build_rule(args.repeat, args.interval, args.count, args.until.as_deref())?;

    let store = app.store();
    let venues = store.venues();

    let mut draft = NewEvent::new(calendar.id, args.title, span);
    if let Some(description) = args.description {
        draft = draft.with_description(description);
    }
    if let Some(location) = args.location.as_deref().and_then(|text| resolve_location(text, &venues)) {
        draft = draft.with_location(location);
    }
    if args.publish {
        draft = draft.with_status(EventStatus::Published);
    }

    let now = Utc::now();
    let horizon = app.settings().horizon_from(now);
    let master = store.save_master_and_regenerate(draft, rule, horizon, now)?;
    let occurrences = store.occurrences_of(master.id).len();

    println!(
        "{} Created {} in {}",
        "✓".green(),
        master.title,
        calendar.render()
    );
    println!("   {}", render_span(&master.span).dimmed());
    if let Some(rule) = rule {
        let repeats = format!("repeats {}: {} more", describe_rule(&rule), occurrences);
        println!("   {}", repeats.dimmed());
    }

    Ok(())
}

fn build_span(start: &str, end: Option<&str>, all_day: bool) -> Result<TimeSpan> {
    let start = parse_when(start)?;
    let end = end.map(parse_when).transpose()?;

    let whole_days = all_day || matches!(start, When::Date(_));
    if whole_days {
        let first = start.instant().date_naive();
        let last = end.map(|end| end.instant().date_naive()).unwrap_or(first);
        let span = TimeSpan::new(start_of_day(first), Some(start_of_day(last) + Duration::days(1)), true)?;
        return Ok(span);
    }

    let start = start.instant();
    let end = match end {
        Some(end) => end.instant(),
        None => start + Duration::hours(1),
    };
    Ok(TimeSpan::new(start, Some(end), false)?)
}

fn build_rule(
    repeat: Option<Repeat>,
    interval: u32,
    count: Option<u32>,
    until: Option<&str>,
) -> Result<Option<RecurrenceRule>> {
    let Some(repeat) = repeat else {
        return Ok(None);
    };

    let limit = match (count, until) {
        (Some(count), _) => Limit::Count(count),
        (None, Some(until)) => Limit::Until(end_of_day(parse_date(until)?)),
        (None, None) => Limit::Unbounded,
    };

    Ok(Some(RecurrenceRule::new(repeat.into(), interval, limit)?))
}

/// The last second of `date`, so that an occurrence on that day still counts.
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_start_makes_all_day_span() {
        let span = build_span("2025-03-20", None, false).unwrap();
        assert!(span.all_day);
        assert_eq!(span.start, Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap());
        assert_eq!(span.end, Some(Utc.with_ymd_and_hms(2025, 3, 21, 0, 0, 0).unwrap()));
    }

    #[test]
    fn all_day_end_date_is_inclusive() {
        let span = build_span("2025-03-20", Some("2025-03-22"), false).unwrap();
        assert_eq!(span.end, Some(Utc.with_ymd_and_hms(2025, 3, 23, 0, 0, 0).unwrap()));
    }

    #[test]
    fn timed_start_defaults_to_one_hour() {
        let span = build_span("2025-03-20T15:00", None, false).unwrap();
        assert!(!span.all_day);
        assert_eq!(span.duration(), Duration::hours(1));
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(build_span("2025-03-20T15:00", Some("2025-03-20T14:00"), false).is_err());
    }

    #[test]
    fn until_covers_the_whole_day() {
        let rule = build_rule(Some(Repeat::Weekly), 1, None, Some("2025-04-01")).unwrap().unwrap();
        assert_eq!(
            rule.limit,
            Limit::Until(Utc.with_ymd_and_hms(2025, 4, 1, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn no_repeat_means_no_rule() {
        assert_eq!(build_rule(None, 1, Some(3), None).unwrap(), None);
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(build_rule(Some(Repeat::Daily), 1, Some(0), None).is_err());
    }
}
