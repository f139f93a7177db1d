//! Core library for eventcal.
//!
//! eventcal keeps calendars of events that may repeat, and keeps calendars
//! subscribed to remote ICS feeds in line with those feeds:
//! - `recurrence` and `expand` turn a master event plus its rule into stored occurrences
//! - `sync` diffs a parsed feed against the imported events and applies the changes
//! - `client` fetches feeds and decides when a subscription is due for a refresh
//! - `store` holds everything, committing each change all at once or not at all

pub mod calendar;
pub mod client;
pub mod config;
pub mod describe;
pub mod error;
pub mod event;
pub mod expand;
pub mod feed;
pub mod ics;
pub mod period;
pub mod recurrence;
pub mod span;
pub mod store;
pub mod sync;
pub mod venue;

pub use calendar::{Calendar, CalendarId, Credentials, NewCalendar, Subscription};
pub use config::Settings;
pub use error::{EventCalError, EventCalResult};
pub use event::{Event, EventId, EventStatus, Location, NewEvent};
pub use period::CalendarPeriod;
pub use recurrence::{Frequency, Limit, RecurrenceRule};
pub use span::TimeSpan;
pub use store::Store;
