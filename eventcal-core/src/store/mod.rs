//! Durable record store for calendars, venues, events and recurrence rules.
//!
//! All tables live in memory behind one lock. Mutations go through
//! [`Store::transaction`], which works on a private copy of the tables and only
//! swaps it in (after persisting it, when the store is backed by a file) if the
//! closure succeeds. Readers therefore see either the state before or the state
//! after a transaction, never anything in between.

mod query;
mod transaction;

pub use query::{EventQuery, KindFilter, StatusFilter, TimeFilter};
pub use transaction::Transaction;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::calendar::{Calendar, CalendarId};
use crate::error::{EventCalError, EventCalResult};
use crate::event::{Event, EventId};
use crate::recurrence::RecurrenceRule;
use crate::venue::{Venue, VenueId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    next_id: u64,
    calendars: BTreeMap<CalendarId, Calendar>,
    venues: BTreeMap<VenueId, Venue>,
    events: BTreeMap<EventId, Event>,
    /// Rules keyed by the owning master, oldest first.
    rules: BTreeMap<EventId, Vec<RecurrenceRule>>,
    #[serde(skip)]
    uuid_index: HashMap<String, EventId>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn reindex(&mut self) -> EventCalResult<()> {
        self.uuid_index.clear();
        for event in self.events.values() {
            if self.uuid_index.insert(event.uuid.clone(), event.id).is_some() {
                return Err(EventCalError::DuplicateUuid(event.uuid.clone()));
            }
        }
        Ok(())
    }
}

pub struct Store {
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Store {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Store {
            path: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Open the store saved at `path`, or start an empty one there.
    pub fn open(path: impl Into<PathBuf>) -> EventCalResult<Self> {
        let path = path.into();

        let mut tables = if path.exists() {
            let content = std::fs::read(&path)?;
            serde_json::from_slice::<Tables>(&content).map_err(|e| {
                EventCalError::Serialization(format!("{}: {}", path.display(), e))
            })?
        } else {
            Tables::default()
        };
        tables.reindex()?;

        tracing::debug!(path = %path.display(), events = tables.events.len(), "opened store");

        Ok(Store {
            path: Some(path),
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against a private copy of the tables and commit it if `f` succeeds.
    ///
    /// Writers are serialized by the table lock. An error from `f` (or from
    /// persisting) leaves the store exactly as it was.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> EventCalResult<T>,
    ) -> EventCalResult<T> {
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut working = guard.clone();

        let value = f(&mut Transaction::new(&mut working))?;

        if let Some(path) = &self.path {
            save(path, &working)?;
        }
        *guard = working;
        Ok(value)
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    // READ SIDE:

    pub fn event(&self, id: EventId) -> Option<Event> {
        self.read().events.get(&id).cloned()
    }

    pub fn event_by_uuid(&self, uuid: &str) -> Option<Event> {
        let tables = self.read();
        let id = tables.uuid_index.get(uuid)?;
        tables.events.get(id).cloned()
    }

    pub fn calendars(&self) -> Vec<Calendar> {
        self.read().calendars.values().cloned().collect()
    }

    pub fn calendar(&self, id: CalendarId) -> Option<Calendar> {
        self.read().calendars.get(&id).cloned()
    }

    /// The first calendar (by id) with this slug, in any category.
    pub fn calendar_by_slug(&self, slug: &str) -> Option<Calendar> {
        self.read()
            .calendars
            .values()
            .find(|calendar| calendar.slug == slug)
            .cloned()
    }

    pub fn venues(&self) -> Vec<Venue> {
        self.read().venues.values().cloned().collect()
    }

    pub fn rules_for(&self, master_id: EventId) -> Vec<RecurrenceRule> {
        self.read().rules.get(&master_id).cloned().unwrap_or_default()
    }

    pub fn active_rule(&self, master_id: EventId) -> Option<RecurrenceRule> {
        self.read()
            .rules
            .get(&master_id)?
            .iter()
            .find(|rule| rule.active)
            .copied()
    }

    /// Occurrences generated for `master_id`, ordered by start.
    pub fn occurrences_of(&self, master_id: EventId) -> Vec<Event> {
        let tables = self.read();
        let mut occurrences: Vec<Event> = tables
            .events
            .values()
            .filter(|event| event.master_id == Some(master_id))
            .cloned()
            .collect();
        occurrences.sort_by_key(|event| (event.span.start, event.id));
        occurrences
    }

    /// Events matching `query`, ordered by start instant then id.
    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        let tables = self.read();
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.span.start, event.id));
        events
    }
}

/// Write to a temp file and rename it over the store so a crash mid-write
/// never leaves a truncated store behind.
fn save(path: &Path, tables: &Tables) -> EventCalResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let content = serde_json::to_vec_pretty(tables)
        .map_err(|e| EventCalError::Serialization(e.to_string()))?;

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::NewCalendar;
    use crate::event::NewEvent;
    use crate::span::TimeSpan;
    use chrono::{TimeZone, Utc};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn draft(calendar_id: CalendarId, title: &str) -> NewEvent {
        NewEvent::new(
            calendar_id,
            title,
            TimeSpan::at(Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap()),
        )
    }

    #[test]
    fn test_failed_transaction_leaves_store_untouched() {
        let store = Store::in_memory();
        let calendar = store
            .transaction(|tx| tx.insert_calendar(NewCalendar::new("Town")))
            .unwrap();

        let result: EventCalResult<()> = store.transaction(|tx| {
            tx.insert_event(draft(calendar.id, "Fair"), now())?;
            Err(EventCalError::Validation("abort".into()))
        });

        assert!(result.is_err());
        assert!(store.query(&EventQuery::new()).is_empty());
    }

    #[test]
    fn test_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let uuid = {
            let store = Store::open(&path).unwrap();
            store
                .transaction(|tx| {
                    let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
                    tx.insert_event(draft(calendar.id, "Fair"), now())
                })
                .unwrap()
                .uuid
        };

        let reopened = Store::open(&path).unwrap();
        let event = reopened.event_by_uuid(&uuid).unwrap();
        assert_eq!(event.title, "Fair");
        assert_eq!(reopened.calendar_by_slug("town").map(|c| c.name), Some("Town".into()));

        // ids keep increasing after a reopen
        let second = reopened
            .transaction(|tx| tx.insert_event(draft(event.calendar_id, "Market"), now()))
            .unwrap();
        assert!(second.id > event.id);
    }

    #[test]
    fn test_query_orders_by_start_then_id() {
        let store = Store::in_memory();
        let ids = store
            .transaction(|tx| {
                let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
                let late = tx.insert_event(
                    NewEvent::new(
                        calendar.id,
                        "Late",
                        TimeSpan::at(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()),
                    ),
                    now(),
                )?;
                let a = tx.insert_event(draft(calendar.id, "A"), now())?;
                let b = tx.insert_event(draft(calendar.id, "B"), now())?;
                Ok(vec![a.id, b.id, late.id])
            })
            .unwrap();

        let listed: Vec<EventId> = store.query(&EventQuery::new()).iter().map(|e| e.id).collect();
        assert_eq!(listed, ids);
    }
}
