//! Parsed subscription feeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::recurrence::RecurrenceRule;
use crate::span::TimeSpan;

/// One fetched and parsed calendar document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedDocument {
    pub entries: Vec<FeedEntry>,
}

impl FeedDocument {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        FeedDocument { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A remote event as the feed describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// The feed's own stable id (an iCalendar UID), when it has one.
    pub external_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub span: TimeSpan,
    pub last_modified: DateTime<Utc>,
    pub recurrence: Option<RecurrenceRule>,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, span: TimeSpan, last_modified: DateTime<Utc>) -> Self {
        FeedEntry {
            external_id: None,
            title: title.into(),
            description: None,
            location: None,
            url: None,
            span,
            last_modified,
            recurrence: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// The uuid this entry is stored under in `calendar`.
    ///
    /// Entries without an external id get one derived from the calendar, title
    /// and start, so importing the same feed again finds the same event.
    pub fn identity(&self, calendar: &Calendar) -> String {
        if let Some(id) = self.external_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        let name = format!(
            "{}\n{}\n{}",
            calendar.slug,
            self.title,
            self.span.start.to_rfc3339()
        );
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarId;
    use chrono::TimeZone;

    fn calendar(slug: &str) -> Calendar {
        Calendar {
            id: CalendarId(1),
            name: slug.to_string(),
            slug: slug.to_string(),
            category: None,
            subscription: None,
        }
    }

    fn entry() -> FeedEntry {
        let start = Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap();
        FeedEntry::new("Fair", TimeSpan::at(start), DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn test_identity_prefers_external_id() {
        let entry = entry().with_external_id("fair-2024@example.com");
        assert_eq!(entry.identity(&calendar("town")), "fair-2024@example.com");
    }

    #[test]
    fn test_derived_identity_is_stable_and_calendar_scoped() {
        let entry = entry();
        assert_eq!(entry.identity(&calendar("town")), entry.identity(&calendar("town")));
        assert_ne!(entry.identity(&calendar("town")), entry.identity(&calendar("sport")));

        let blank = entry.clone().with_external_id("  ");
        assert_eq!(blank.identity(&calendar("town")), entry.identity(&calendar("town")));
    }
}
