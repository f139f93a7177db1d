use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Tables;
use crate::calendar::{Calendar, CalendarId, NewCalendar};
use crate::error::{EventCalError, EventCalResult};
use crate::event::{Event, EventId, NewEvent};
use crate::recurrence::RecurrenceRule;
use crate::venue::{NewVenue, Venue, VenueId};

/// Mutable view of the store inside [`super::Store::transaction`].
pub struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(tables: &'a mut Tables) -> Self {
        Transaction { tables }
    }

    // CALENDARS:

    pub fn insert_calendar(&mut self, new: NewCalendar) -> EventCalResult<Calendar> {
        let slug = new.resolved_slug()?;
        self.check_calendar_unique(None, &new.name, new.category.as_deref(), &slug)?;

        let calendar = Calendar {
            id: CalendarId(self.tables.allocate_id()),
            name: new.name,
            slug,
            category: new.category,
            subscription: new.subscription,
        };
        self.tables.calendars.insert(calendar.id, calendar.clone());
        Ok(calendar)
    }

    pub fn update_calendar(&mut self, calendar: Calendar) -> EventCalResult<()> {
        if !self.tables.calendars.contains_key(&calendar.id) {
            return Err(EventCalError::CalendarNotFound(calendar.id.to_string()));
        }
        if calendar.name.trim().is_empty() || calendar.slug.is_empty() {
            return Err(EventCalError::Validation(format!(
                "'{}' is not a usable calendar name",
                calendar.name
            )));
        }
        self.check_calendar_unique(
            Some(calendar.id),
            &calendar.name,
            calendar.category.as_deref(),
            &calendar.slug,
        )?;
        self.tables.calendars.insert(calendar.id, calendar);
        Ok(())
    }

    fn check_calendar_unique(
        &self,
        own_id: Option<CalendarId>,
        name: &str,
        category: Option<&str>,
        slug: &str,
    ) -> EventCalResult<()> {
        let others = self
            .tables
            .calendars
            .values()
            .filter(|c| Some(c.id) != own_id);

        for other in others {
            if other.name == name {
                return Err(EventCalError::DuplicateCalendar(format!(
                    "a calendar named '{name}' already exists"
                )));
            }
            if other.slug == slug && other.category.as_deref() == category {
                return Err(EventCalError::DuplicateCalendar(format!(
                    "slug '{slug}' is already taken in this category"
                )));
            }
        }
        Ok(())
    }

    pub fn calendar(&self, id: CalendarId) -> EventCalResult<&Calendar> {
        self.tables
            .calendars
            .get(&id)
            .ok_or_else(|| EventCalError::CalendarNotFound(id.to_string()))
    }

    /// Record a successful refresh of the calendar's subscription.
    pub fn mark_refreshed(
        &mut self,
        id: CalendarId,
        now: DateTime<Utc>,
        count: usize,
    ) -> EventCalResult<()> {
        let calendar = self
            .tables
            .calendars
            .get_mut(&id)
            .ok_or_else(|| EventCalError::CalendarNotFound(id.to_string()))?;
        let subscription = calendar
            .subscription
            .as_mut()
            .ok_or_else(|| EventCalError::NoSubscription(calendar.slug.clone()))?;
        subscription.mark_refreshed(now, count);
        Ok(())
    }

    // VENUES:

    pub fn insert_venue(&mut self, new: NewVenue) -> EventCalResult<Venue> {
        if new.title.trim().is_empty() {
            return Err(EventCalError::Validation("venue title is required".into()));
        }
        let venue = Venue {
            id: VenueId(self.tables.allocate_id()),
            title: new.title,
            address: new.address,
            postcode: new.postcode,
        };
        self.tables.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    // EVENTS:

    pub fn event(&self, id: EventId) -> EventCalResult<&Event> {
        self.tables
            .events
            .get(&id)
            .ok_or_else(|| EventCalError::EventNotFound(id.to_string()))
    }

    pub fn event_by_uuid(&self, uuid: &str) -> Option<&Event> {
        let id = self.tables.uuid_index.get(uuid)?;
        self.tables.events.get(id)
    }

    pub fn insert_event(&mut self, draft: NewEvent, now: DateTime<Utc>) -> EventCalResult<Event> {
        draft.validate()?;
        self.calendar(draft.calendar_id)?;
        if let Some(master_id) = draft.master_id {
            if !self.event(master_id)?.is_master() {
                return Err(EventCalError::Validation(format!(
                    "occurrence {master_id} cannot own occurrences"
                )));
            }
        }

        let uuid = draft
            .uuid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.tables.uuid_index.contains_key(&uuid) {
            return Err(EventCalError::DuplicateUuid(uuid));
        }

        let id = EventId(self.tables.allocate_id());
        let event = Event::from_draft(id, uuid, draft, now);
        self.tables.uuid_index.insert(event.uuid.clone(), id);
        self.tables.events.insert(id, event.clone());
        Ok(event)
    }

    /// Replace a stored event's fields and stamp `updated_at`.
    pub fn update_event(&mut self, mut event: Event, now: DateTime<Utc>) -> EventCalResult<Event> {
        event.validate()?;
        let stored = self.event(event.id)?;
        let previous_uuid = stored.uuid.clone();
        event.created_at = stored.created_at;
        event.master_id = stored.master_id;

        if event.uuid != previous_uuid {
            if self.tables.uuid_index.contains_key(&event.uuid) {
                return Err(EventCalError::DuplicateUuid(event.uuid));
            }
            self.tables.uuid_index.remove(&previous_uuid);
            self.tables.uuid_index.insert(event.uuid.clone(), event.id);
        }

        event.updated_at = now;
        self.tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    /// Delete an event along with its occurrences and recurrence rules.
    pub fn delete_event(&mut self, id: EventId) -> EventCalResult<Event> {
        let event = self
            .tables
            .events
            .remove(&id)
            .ok_or_else(|| EventCalError::EventNotFound(id.to_string()))?;
        self.tables.uuid_index.remove(&event.uuid);
        self.tables.rules.remove(&id);
        self.delete_occurrences(id);
        Ok(event)
    }

    /// Remove every occurrence owned by `master_id`, returning how many went.
    pub fn delete_occurrences(&mut self, master_id: EventId) -> usize {
        let children: Vec<EventId> = self
            .tables
            .events
            .values()
            .filter(|event| event.master_id == Some(master_id))
            .map(|event| event.id)
            .collect();

        for child in &children {
            if let Some(event) = self.tables.events.remove(child) {
                self.tables.uuid_index.remove(&event.uuid);
            }
        }
        children.len()
    }

    /// Occurrences of `master_id`, ordered by start.
    pub fn occurrences_of(&self, master_id: EventId) -> Vec<&Event> {
        let mut occurrences: Vec<&Event> = self
            .tables
            .events
            .values()
            .filter(|event| event.master_id == Some(master_id))
            .collect();
        occurrences.sort_by_key(|event| (event.span.start, event.id));
        occurrences
    }

    /// The master event in `calendar_id` with this uuid.
    pub fn find_master(&self, calendar_id: CalendarId, uuid: &str) -> Option<&Event> {
        self.event_by_uuid(uuid)
            .filter(|event| event.calendar_id == calendar_id && event.is_master())
    }

    /// Master events of a calendar, ordered by id.
    pub fn masters(&self, calendar_id: CalendarId) -> Vec<&Event> {
        self.tables
            .events
            .values()
            .filter(|event| event.calendar_id == calendar_id && event.is_master())
            .collect()
    }

    // RECURRENCE RULES:

    /// Attach `rule` to a master. Adding an active rule deactivates the others,
    /// so at most one rule is ever active.
    pub fn add_rule(&mut self, master_id: EventId, rule: RecurrenceRule) -> EventCalResult<()> {
        if !self.event(master_id)?.is_master() {
            return Err(EventCalError::Validation(format!(
                "occurrence {master_id} cannot carry a recurrence rule"
            )));
        }
        RecurrenceRule::new(rule.frequency, rule.interval, rule.limit)?;

        if rule.active {
            self.deactivate_rules(master_id);
        }
        self.tables.rules.entry(master_id).or_default().push(rule);
        Ok(())
    }

    /// Deactivate every rule of `master_id`, returning how many were active.
    pub fn deactivate_rules(&mut self, master_id: EventId) -> usize {
        let Some(rules) = self.tables.rules.get_mut(&master_id) else {
            return 0;
        };
        let mut deactivated = 0;
        for rule in rules.iter_mut().filter(|rule| rule.active) {
            rule.active = false;
            deactivated += 1;
        }
        deactivated
    }

    pub fn active_rule(&self, master_id: EventId) -> Option<&RecurrenceRule> {
        self.rules_for(master_id).iter().find(|rule| rule.active)
    }

    pub fn rules_for(&self, master_id: EventId) -> &[RecurrenceRule] {
        self.tables
            .rules
            .get(&master_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Frequency, Limit};
    use crate::span::TimeSpan;
    use crate::store::Store;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn span() -> TimeSpan {
        TimeSpan::at(Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_calendar_name_and_slug_uniqueness() {
        let store = Store::in_memory();
        store
            .transaction(|tx| tx.insert_calendar(NewCalendar::new("Town Events")))
            .unwrap();

        let same_name = store.transaction(|tx| tx.insert_calendar(NewCalendar::new("Town Events")));
        assert!(matches!(same_name, Err(EventCalError::DuplicateCalendar(_))));

        let same_slug = store.transaction(|tx| tx.insert_calendar(NewCalendar::new("town events!")));
        assert!(matches!(same_slug, Err(EventCalError::DuplicateCalendar(_))));

        // the same slug is fine in another category
        let other_category = store.transaction(|tx| {
            tx.insert_calendar(NewCalendar::new("town events!").with_category("sport"))
        });
        assert!(other_category.is_ok());
    }

    #[test]
    fn test_duplicate_uuid_rejected() {
        let store = Store::in_memory();
        let result = store.transaction(|tx| {
            let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
            let mut draft = NewEvent::new(calendar.id, "Fair", span());
            draft.uuid = Some("fair@example.com".into());
            tx.insert_event(draft.clone(), now())?;
            tx.insert_event(draft, now())
        });
        assert!(matches!(result, Err(EventCalError::DuplicateUuid(uuid)) if uuid == "fair@example.com"));
    }

    #[test]
    fn test_insert_event_requires_calendar() {
        let store = Store::in_memory();
        let result = store.transaction(|tx| tx.insert_event(NewEvent::new(CalendarId(99), "Fair", span()), now()));
        assert!(matches!(result, Err(EventCalError::CalendarNotFound(_))));
    }

    #[test]
    fn test_delete_cascades_to_occurrences_and_rules() {
        let store = Store::in_memory();
        let master = store
            .transaction(|tx| {
                let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
                let master = tx.insert_event(NewEvent::new(calendar.id, "Fair", span()), now())?;
                let mut child = NewEvent::new(calendar.id, "Fair", span());
                child.master_id = Some(master.id);
                tx.insert_event(child, now())?;
                tx.add_rule(master.id, RecurrenceRule::new(Frequency::Daily, 1, Limit::Count(2))?)?;
                Ok(master)
            })
            .unwrap();
        assert_eq!(store.occurrences_of(master.id).len(), 1);

        store.transaction(|tx| tx.delete_event(master.id)).unwrap();
        assert!(store.query(&crate::store::EventQuery::new()).is_empty());
        assert!(store.rules_for(master.id).is_empty());
    }

    #[test]
    fn test_only_one_active_rule() {
        let store = Store::in_memory();
        let master = store
            .transaction(|tx| {
                let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
                let master = tx.insert_event(NewEvent::new(calendar.id, "Fair", span()), now())?;
                tx.add_rule(master.id, RecurrenceRule::new(Frequency::Daily, 1, Limit::Unbounded)?)?;
                tx.add_rule(master.id, RecurrenceRule::new(Frequency::Weekly, 1, Limit::Unbounded)?)?;
                Ok(master)
            })
            .unwrap();

        let rules = store.rules_for(master.id);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.iter().filter(|r| r.active).count(), 1);
        assert_eq!(store.active_rule(master.id).map(|r| r.frequency), Some(Frequency::Weekly));
    }

    #[test]
    fn test_occurrence_cannot_carry_rule() {
        let store = Store::in_memory();
        let result = store.transaction(|tx| {
            let calendar = tx.insert_calendar(NewCalendar::new("Town"))?;
            let master = tx.insert_event(NewEvent::new(calendar.id, "Fair", span()), now())?;
            let mut child = NewEvent::new(calendar.id, "Fair", span());
            child.master_id = Some(master.id);
            let child = tx.insert_event(child, now())?;
            tx.add_rule(child.id, RecurrenceRule::new(Frequency::Daily, 1, Limit::Unbounded)?)
        });
        assert!(matches!(result, Err(EventCalError::Validation(_))));
    }
}
