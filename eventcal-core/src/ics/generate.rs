//! ICS export of a calendar's master events.

use chrono::{DateTime, Utc};
use icalendar::{Calendar as IcsCalendar, Component, EventLike, Property, ValueType};

use crate::calendar::Calendar;
use crate::event::{Event, Location};
use crate::recurrence::RecurrenceRule;
use crate::venue::Venue;

const PRODID: &str = "PRODID:-//eventcal//eventcal//EN";

/// A VCALENDAR with one VEVENT per master, carrying its active rule as RRULE.
///
/// Venue locations are written as the venue's title so that importing the
/// export resolves them to the same venue again.
pub fn export_calendar(
    calendar: &Calendar,
    masters: &[(Event, Option<RecurrenceRule>)],
    venues: &[Venue],
) -> String {
    let mut cal = IcsCalendar::new();
    cal.name(&calendar.name);

    for (event, rule) in masters {
        cal.push(vevent(event, rule.as_ref(), venues));
    }

    strip_ics_bloat(&cal.done().to_string())
}

fn vevent(event: &Event, rule: Option<&RecurrenceRule>, venues: &[Venue]) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uuid);
    ics_event.summary(&event.title);

    ics_event.add_property("DTSTAMP", utc_stamp(event.updated_at));
    ics_event.add_property("CREATED", utc_stamp(event.created_at));
    ics_event.add_property("LAST-MODIFIED", utc_stamp(event.updated_at));

    add_instant(&mut ics_event, "DTSTART", event.span.start, event.span.all_day);
    if let Some(end) = event.span.end {
        add_instant(&mut ics_event, "DTEND", end, event.span.all_day);
    }

    if let Some(ref description) = event.description {
        ics_event.description(description);
    }

    match &event.location {
        Some(Location::Text(text)) => {
            ics_event.location(text);
        }
        Some(Location::Venue(id)) => {
            if let Some(venue) = venues.iter().find(|v| v.id == *id) {
                ics_event.location(&venue.title);
            }
        }
        None => {}
    }

    if let Some(ref url) = event.url {
        ics_event.add_property("URL", url);
    }

    if let Some(rule) = rule.filter(|rule| rule.active) {
        ics_event.add_property("RRULE", rule.to_rrule());
    }

    ics_event.done()
}

fn utc_stamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// All-day instants are written as DATE values, everything else in UTC.
fn add_instant(ics_event: &mut icalendar::Event, name: &str, instant: DateTime<Utc>, all_day: bool) {
    if all_day {
        let date = instant.date_naive();
        let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
        prop.append_parameter(ValueType::Date);
        ics_event.append_property(prop);
    } else {
        ics_event.add_property(name, utc_stamp(instant));
    }
}

/// Replace the icalendar crate's PRODID and drop the redundant CALSCALE line.
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }
        if line == "CALSCALE:GREGORIAN" {
            continue;
        }
        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
