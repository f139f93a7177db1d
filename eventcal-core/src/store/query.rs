//! Explicit query values for listing events.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::calendar::CalendarId;
use crate::event::{Event, EventStatus};
use crate::period::CalendarPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFilter {
    #[default]
    Any,
    /// Starting strictly before the instant.
    Before(DateTime<Utc>),
    /// Starting at or after the instant.
    After(DateTime<Utc>),
    /// Overlapping the period; open bounds are unbounded.
    Between(CalendarPeriod),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Any,
    Only(EventStatus),
    /// Published or imported.
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    /// Masters, standalone events and occurrences alike.
    #[default]
    All,
    Masters,
    Occurrences,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventQuery {
    /// Empty means every calendar.
    pub calendars: BTreeSet<CalendarId>,
    pub time: TimeFilter,
    pub status: StatusFilter,
    pub kind: KindFilter,
}

impl EventQuery {
    pub fn new() -> Self {
        EventQuery::default()
    }

    pub fn in_calendars(mut self, calendars: impl IntoIterator<Item = CalendarId>) -> Self {
        self.calendars.extend(calendars);
        self
    }

    pub fn before(mut self, instant: DateTime<Utc>) -> Self {
        self.time = TimeFilter::Before(instant);
        self
    }

    pub fn after(mut self, instant: DateTime<Utc>) -> Self {
        self.time = TimeFilter::After(instant);
        self
    }

    pub fn between(mut self, period: CalendarPeriod) -> Self {
        self.time = TimeFilter::Between(period);
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = StatusFilter::Only(status);
        self
    }

    pub fn approved(mut self) -> Self {
        self.status = StatusFilter::Approved;
        self
    }

    pub fn of_kind(mut self, kind: KindFilter) -> Self {
        self.kind = kind;
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.calendars.is_empty() && !self.calendars.contains(&event.calendar_id) {
            return false;
        }

        let in_time = match self.time {
            TimeFilter::Any => true,
            TimeFilter::Before(instant) => event.span.start < instant,
            TimeFilter::After(instant) => event.span.start >= instant,
            TimeFilter::Between(period) => {
                let (start, finish) = period.bounds();
                event.span.overlaps(start, finish)
            }
        };

        let status = match self.status {
            StatusFilter::Any => true,
            StatusFilter::Only(status) => event.status == status,
            StatusFilter::Approved => event.status.is_approved(),
        };

        let kind = match self.kind {
            KindFilter::All => true,
            KindFilter::Masters => event.is_master(),
            KindFilter::Occurrences => event.is_occurrence(),
        };

        in_time && status && kind
    }
}
