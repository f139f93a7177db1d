//! Event records: masters, standalone events and generated occurrences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calendar::CalendarId;
use crate::error::{EventCalError, EventCalResult};
use crate::span::TimeSpan;
use crate::venue::VenueId;

/// Storage primary key of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Submitted,
    Published,
    Imported,
}

impl EventStatus {
    /// Visible to the public: published by an editor, or imported from a feed.
    pub fn is_approved(self) -> bool {
        matches!(self, EventStatus::Published | EventStatus::Imported)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Draft => "draft",
            EventStatus::Submitted => "submitted",
            EventStatus::Published => "published",
            EventStatus::Imported => "imported",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EventStatus {
    type Err = EventCalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "submitted" => Ok(EventStatus::Submitted),
            "published" => Ok(EventStatus::Published),
            "imported" => Ok(EventStatus::Imported),
            other => Err(EventCalError::Validation(format!("unknown status '{other}'"))),
        }
    }
}

/// Where an event takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// A known venue.
    Venue(VenueId),
    /// Free text that did not match any venue.
    Text(String),
}

/// An event that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Assigned on insert when absent.
    pub uuid: Option<String>,
    pub calendar_id: CalendarId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub url: Option<String>,
    pub span: TimeSpan,
    pub status: EventStatus,
    /// Identifier of the event in an external service, if any.
    pub external_ref: Option<String>,
    pub master_id: Option<EventId>,
}

impl NewEvent {
    pub fn new(calendar_id: CalendarId, title: impl Into<String>, span: TimeSpan) -> Self {
        NewEvent {
            uuid: None,
            calendar_id,
            title: title.into(),
            description: None,
            location: None,
            url: None,
            span,
            status: EventStatus::Draft,
            external_ref: None,
            master_id: None,
        }
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn validate(&self) -> EventCalResult<()> {
        validate_fields(&self.title, &self.span, self.uuid.as_deref())
    }
}

/// A stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub uuid: String,
    pub calendar_id: CalendarId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub url: Option<String>,
    pub span: TimeSpan,
    pub status: EventStatus,
    pub external_ref: Option<String>,
    /// Set on generated occurrences only.
    pub master_id: Option<EventId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub(crate) fn from_draft(id: EventId, uuid: String, draft: NewEvent, now: DateTime<Utc>) -> Self {
        Event {
            id,
            uuid,
            calendar_id: draft.calendar_id,
            title: draft.title,
            description: draft.description,
            location: draft.location,
            url: draft.url,
            span: draft.span,
            status: draft.status,
            external_ref: draft.external_ref,
            master_id: draft.master_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// A master or standalone event, as opposed to a generated occurrence.
    pub fn is_master(&self) -> bool {
        self.master_id.is_none()
    }

    pub fn is_occurrence(&self) -> bool {
        self.master_id.is_some()
    }

    pub fn validate(&self) -> EventCalResult<()> {
        validate_fields(&self.title, &self.span, Some(&self.uuid))
    }
}

fn validate_fields(title: &str, span: &TimeSpan, uuid: Option<&str>) -> EventCalResult<()> {
    if title.trim().is_empty() {
        return Err(EventCalError::Validation("event title is required".into()));
    }
    if span.end.is_some_and(|end| end < span.start) {
        return Err(EventCalError::Validation(format!(
            "event '{title}' ends before it starts"
        )));
    }
    if uuid.is_some_and(|uuid| uuid.trim().is_empty()) {
        return Err(EventCalError::Validation(format!(
            "event '{title}' has an empty uuid"
        )));
    }
    Ok(())
}
