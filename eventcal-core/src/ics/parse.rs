//! Feed parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::client::FeedParser;
use crate::error::{EventCalError, EventCalResult};
use crate::feed::{FeedDocument, FeedEntry};
use crate::recurrence::{RecurrenceRule, RruleError};
use crate::span::{TimeSpan, midnight};

/// Reads iCalendar documents into [`FeedDocument`]s.
///
/// Floating times (no `Z`, no `TZID`) are read in the parser's default offset,
/// which is UTC unless set otherwise.
#[derive(Debug, Clone, Copy)]
pub struct IcsParser {
    default_offset: FixedOffset,
}

impl Default for IcsParser {
    fn default() -> Self {
        IcsParser {
            default_offset: Utc.fix(),
        }
    }
}

impl IcsParser {
    pub fn new() -> Self {
        IcsParser::default()
    }

    pub fn with_default_offset(offset: FixedOffset) -> Self {
        IcsParser {
            default_offset: offset,
        }
    }

    pub fn parse_str(&self, content: &str) -> EventCalResult<FeedDocument> {
        let content = content.trim_start_matches('\u{feff}');
        let unfolded = unfold(content);
        let calendar =
            read_calendar(&unfolded).map_err(|e| EventCalError::Parse(e.to_string()))?;

        let mut vevents = Vec::new();
        collect_vevents(&calendar.components, &mut vevents);

        let mut entries = Vec::with_capacity(vevents.len());
        for vevent in vevents {
            if vevent.find_prop("RECURRENCE-ID").is_some() {
                tracing::debug!(
                    uid = vevent.find_prop("UID").map(|p| p.val.as_ref()).unwrap_or_default(),
                    "skipping per-instance override"
                );
                continue;
            }
            entries.push(self.parse_entry(vevent)?);
        }

        Ok(FeedDocument::new(entries))
    }

    fn parse_entry(&self, vevent: &Component<'_>) -> EventCalResult<FeedEntry> {
        let external_id = text_prop(vevent, "UID");
        let title = text_prop(vevent, "SUMMARY").unwrap_or_else(|| "(No title)".to_string());
        let label = external_id.clone().unwrap_or_else(|| title.clone());

        let dtstart = vevent
            .find_prop("DTSTART")
            .ok_or_else(|| EventCalError::Parse(format!("event '{label}' has no DTSTART")))?;
        let (start, all_day) = self.instant(dtstart, &label)?;

        let end = if let Some(dtend) = vevent.find_prop("DTEND") {
            Some(self.instant(dtend, &label)?.0)
        } else if let Some(duration) = vevent.find_prop("DURATION") {
            Some(start + parse_duration(duration.val.as_ref(), &label)?)
        } else if all_day {
            // a DATE start without an end lasts the whole day
            Some(start + Duration::days(1))
        } else {
            None
        };

        let span = TimeSpan::new(start, end, all_day)
            .map_err(|e| EventCalError::Parse(format!("event '{label}': {e}")))?;

        // DTSTAMP is the revision time of a published VEVENT
        let last_modified = match vevent
            .find_prop("LAST-MODIFIED")
            .or_else(|| vevent.find_prop("DTSTAMP"))
            .or_else(|| vevent.find_prop("CREATED"))
        {
            Some(prop) => self.instant(prop, &label)?.0,
            None => DateTime::<Utc>::UNIX_EPOCH,
        };

        let recurrence = match vevent.find_prop("RRULE") {
            None => None,
            Some(prop) => match RecurrenceRule::from_rrule(prop.val.as_ref()) {
                Ok(rule) => Some(rule),
                Err(RruleError::UnsupportedFrequency(freq)) => {
                    tracing::warn!(event = %label, freq = %freq, "dropping recurrence with unsupported frequency");
                    None
                }
                Err(err) => {
                    return Err(EventCalError::Parse(format!("event '{label}': {err}")));
                }
            },
        };

        Ok(FeedEntry {
            external_id,
            title,
            description: text_prop(vevent, "DESCRIPTION"),
            location: text_prop(vevent, "LOCATION"),
            url: text_prop(vevent, "URL"),
            span,
            last_modified,
            recurrence,
        })
    }

    /// The instant a date or date-time property names, and whether it was a date.
    fn instant(&self, prop: &Property<'_>, label: &str) -> EventCalResult<(DateTime<Utc>, bool)> {
        let value = DatePerhapsTime::try_from(prop).map_err(|_| {
            EventCalError::Parse(format!(
                "event '{}': malformed {} '{}'",
                label,
                prop.name.as_ref(),
                prop.val.as_ref()
            ))
        })?;

        match value {
            DatePerhapsTime::Date(date) => Ok((midnight(date), true)),
            DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Ok((dt, false)),
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
                Ok((self.floating(naive), false))
            }
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
                Ok((self.zoned(date_time, &tzid), false))
            }
        }
    }

    fn floating(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        self.default_offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc())
    }

    fn zoned(&self, naive: NaiveDateTime, tzid: &str) -> DateTime<Utc> {
        let Ok(tz) = tzid.parse::<chrono_tz::Tz>() else {
            tracing::debug!(tzid, "unknown TZID, reading time as floating");
            return self.floating(naive);
        };
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            // a time skipped by a DST change is read with the offset in force
            // before the gap, which moves it forward by the gap's length
            LocalResult::None => {
                let before = tz.offset_from_utc_datetime(&(naive - Duration::days(1))).fix();
                (naive - Duration::seconds(i64::from(before.local_minus_utc()))).and_utc()
            }
        }
    }
}

impl FeedParser for IcsParser {
    fn parse(&self, bytes: &[u8]) -> EventCalResult<FeedDocument> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| EventCalError::Parse(format!("feed is not UTF-8: {e}")))?;
        self.parse_str(content)
    }
}

fn collect_vevents<'c, 'a>(components: &'c [Component<'a>], out: &mut Vec<&'c Component<'a>>) {
    for component in components {
        if component.name == "VEVENT" {
            out.push(component);
        } else if component.name == "VCALENDAR" {
            collect_vevents(&component.components, out);
        }
    }
}

fn text_prop(vevent: &Component<'_>, name: &str) -> Option<String> {
    vevent
        .find_prop(name)
        .map(|p| p.val.to_string())
        .filter(|v| !v.trim().is_empty())
}

fn parse_duration(value: &str, label: &str) -> EventCalResult<Duration> {
    let malformed = || EventCalError::Parse(format!("event '{label}': malformed DURATION '{value}'"));
    let duration = iso8601::duration(value).map_err(|_| malformed())?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Frequency, Limit};

    fn wrap(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\n{body}END:VCALENDAR\r\n")
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parses_timed_event() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:fair@example.com\r\n\
SUMMARY:Summer Fair\r\n\
DESCRIPTION:Stalls and \r\n music\r\n\
LOCATION:Town Hall\r\n\
URL:https://example.com/fair\r\n\
DTSTART:20240601T100000Z\r\n\
DTEND:20240601T160000Z\r\n\
LAST-MODIFIED:20240501T080000Z\r\n\
END:VEVENT\r\n",
        );

        let doc = IcsParser::new().parse_str(&ics).unwrap();
        assert_eq!(doc.entries.len(), 1);
        let entry = &doc.entries[0];
        assert_eq!(entry.external_id.as_deref(), Some("fair@example.com"));
        assert_eq!(entry.title, "Summer Fair");
        assert_eq!(entry.description.as_deref(), Some("Stalls and music"));
        assert_eq!(entry.location.as_deref(), Some("Town Hall"));
        assert_eq!(entry.span.start, utc(2024, 6, 1, 10, 0));
        assert_eq!(entry.span.end, Some(utc(2024, 6, 1, 16, 0)));
        assert!(!entry.span.all_day);
        assert_eq!(entry.last_modified, utc(2024, 5, 1, 8, 0));
        assert_eq!(entry.recurrence, None);
    }

    #[test]
    fn test_date_values_are_all_day() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:holiday\r\n\
SUMMARY:Holiday\r\n\
DTSTART;VALUE=DATE:20240527\r\n\
END:VEVENT\r\n",
        );
        let entry = &IcsParser::new().parse_str(&ics).unwrap().entries[0];
        assert!(entry.span.all_day);
        assert!(entry.span.is_all_day());
        assert_eq!(entry.span.end, Some(utc(2024, 5, 28, 0, 0)));
        assert_eq!(entry.last_modified, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_tzid_and_duration() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:talk\r\n\
SUMMARY:Talk\r\n\
DTSTART;TZID=Europe/London:20240701T190000\r\n\
DURATION:PT1H30M\r\n\
CREATED:20240601T000000Z\r\n\
END:VEVENT\r\n",
        );
        let entry = &IcsParser::new().parse_str(&ics).unwrap().entries[0];
        // BST is UTC+1
        assert_eq!(entry.span.start, utc(2024, 7, 1, 18, 0));
        assert_eq!(entry.span.end, Some(utc(2024, 7, 1, 19, 30)));
        assert_eq!(entry.last_modified, utc(2024, 6, 1, 0, 0));
    }

    #[test]
    fn test_dtstamp_stands_in_for_last_modified() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:meet@example.com\r\n\
SUMMARY:Meet\r\n\
DTSTAMP:20240510T080000Z\r\n\
CREATED:20240401T000000Z\r\n\
DTSTART:20240601T100000Z\r\n\
END:VEVENT\r\n",
        );
        let entry = &IcsParser::new().parse_str(&ics).unwrap().entries[0];
        assert_eq!(entry.last_modified, utc(2024, 5, 10, 8, 0));

        let with_last_modified = ics.replace(
            "DTSTAMP:20240510T080000Z",
            "DTSTAMP:20240510T080000Z\r\nLAST-MODIFIED:20240502T000000Z",
        );
        let entry = &IcsParser::new().parse_str(&with_last_modified).unwrap().entries[0];
        assert_eq!(entry.last_modified, utc(2024, 5, 2, 0, 0));
    }

    #[test]
    fn test_times_in_a_dst_gap_move_forward() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:early\r\n\
SUMMARY:Early\r\n\
DTSTART;TZID=America/New_York:20240310T023000\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:island\r\n\
SUMMARY:Island\r\n\
DTSTART;TZID=Australia/Lord_Howe:20241006T021500\r\n\
END:VEVENT\r\n",
        );
        let doc = IcsParser::new().parse_str(&ics).unwrap();
        // 02:30 EST does not exist; 03:30 EDT is 07:30 UTC
        assert_eq!(doc.entries[0].span.start, utc(2024, 3, 10, 7, 30));
        // the half-hour gap: 02:15 at +10:30 becomes 02:45 at +11
        assert_eq!(doc.entries[1].span.start, utc(2024, 10, 5, 15, 45));
    }

    #[test]
    fn test_floating_time_uses_default_offset() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:float\r\n\
SUMMARY:Float\r\n\
DTSTART:20240701T090000\r\n\
END:VEVENT\r\n",
        );
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let entry = &IcsParser::with_default_offset(offset).parse_str(&ics).unwrap().entries[0];
        assert_eq!(entry.span.start, utc(2024, 7, 1, 7, 0));
        assert_eq!(entry.span.end, None);
    }

    #[test]
    fn test_rrule_and_overrides() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:standup\r\n\
SUMMARY:Standup\r\n\
DTSTART:20240101T090000Z\r\n\
DTEND:20240101T091500Z\r\n\
RRULE:FREQ=WEEKLY;COUNT=4\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
SUMMARY:Standup (moved)\r\n\
RECURRENCE-ID:20240108T090000Z\r\n\
DTSTART:20240108T100000Z\r\n\
END:VEVENT\r\n",
        );
        let doc = IcsParser::new().parse_str(&ics).unwrap();
        assert_eq!(doc.entries.len(), 1);
        let rule = doc.entries[0].recurrence.unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.limit, Limit::Count(4));
    }

    #[test]
    fn test_unsupported_frequency_drops_rule_only() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
UID:tick\r\n\
SUMMARY:Tick\r\n\
DTSTART:20240101T090000Z\r\n\
RRULE:FREQ=HOURLY\r\n\
END:VEVENT\r\n",
        );
        let doc = IcsParser::new().parse_str(&ics).unwrap();
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].recurrence, None);
    }

    #[test]
    fn test_malformed_entries_abort() {
        let missing_start = wrap("BEGIN:VEVENT\r\nUID:x\r\nSUMMARY:X\r\nEND:VEVENT\r\n");
        assert!(matches!(
            IcsParser::new().parse_str(&missing_start),
            Err(EventCalError::Parse(_))
        ));

        let bad_rrule = wrap(
            "BEGIN:VEVENT\r\nUID:x\r\nSUMMARY:X\r\nDTSTART:20240101T090000Z\r\nRRULE:FREQ=DAILY;COUNT=0\r\nEND:VEVENT\r\n",
        );
        assert!(matches!(
            IcsParser::new().parse_str(&bad_rrule),
            Err(EventCalError::Parse(_))
        ));

        let inverted = wrap(
            "BEGIN:VEVENT\r\nUID:x\r\nSUMMARY:X\r\nDTSTART:20240101T090000Z\r\nDTEND:20240101T080000Z\r\nEND:VEVENT\r\n",
        );
        assert!(matches!(
            IcsParser::new().parse_str(&inverted),
            Err(EventCalError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_non_utf8() {
        assert!(matches!(
            IcsParser::new().parse(&[0xff, 0xfe, 0x00]),
            Err(EventCalError::Parse(_))
        ));
    }
}
