//! Occurrence expansion for recurring master events.
//!
//! A master's occurrences are never patched in place: whenever its span or rule
//! changes, every child is destroyed and the full set is generated again up to
//! the horizon. Callers follow a two-step protocol: `save_master` /
//! `update_master`, then `regenerate_occurrences` when the schedule changed,
//! both inside the same store transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EventCalError, EventCalResult};
use crate::event::{Event, EventId, NewEvent};
use crate::recurrence::RecurrenceRule;
use crate::span::TimeSpan;
use crate::store::{Store, Transaction};

/// Spans of the occurrences `rule` generates for a master spanning `master_span`.
///
/// The master's own instance is not part of the result. An absent or inactive
/// rule yields nothing.
pub fn expand(
    master_span: &TimeSpan,
    rule: Option<&RecurrenceRule>,
    horizon: DateTime<Utc>,
) -> Vec<TimeSpan> {
    let Some(rule) = rule.filter(|rule| rule.active) else {
        return Vec::new();
    };

    rule.instances(master_span.start, horizon)
        .skip(1)
        .filter(|start| *start != master_span.start)
        .map(|start| master_span.shifted_to(start))
        .collect()
}

pub struct OccurrenceExpander;

impl OccurrenceExpander {
    /// Unsaved occurrence events for `master`: copies of its descriptive fields
    /// on each expanded span.
    pub fn materialize(
        master: &Event,
        rule: Option<&RecurrenceRule>,
        horizon: DateTime<Utc>,
    ) -> Vec<NewEvent> {
        expand(&master.span, rule, horizon)
            .into_iter()
            .map(|span| NewEvent {
                uuid: Some(occurrence_uuid(&master.uuid, span.start)),
                calendar_id: master.calendar_id,
                title: master.title.clone(),
                description: master.description.clone(),
                location: master.location.clone(),
                url: master.url.clone(),
                span,
                status: master.status,
                external_ref: master.external_ref.clone(),
                master_id: Some(master.id),
            })
            .collect()
    }
}

/// Identity of the occurrence of `master_uuid` starting at `start`.
///
/// Stable for as long as the master's schedule is.
fn occurrence_uuid(master_uuid: &str, start: DateTime<Utc>) -> String {
    let name = format!("{}#{}", master_uuid, start.to_rfc3339());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Replace all occurrences of `master_id` with a freshly expanded set.
///
/// Returns the number of occurrences now stored.
pub fn regenerate_occurrences(
    tx: &mut Transaction<'_>,
    master_id: EventId,
    horizon: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EventCalResult<usize> {
    let master = tx.event(master_id)?.clone();
    if !master.is_master() {
        return Err(EventCalError::Validation(format!(
            "event {master_id} is an occurrence, not a master"
        )));
    }
    let rule = tx.active_rule(master_id).copied();

    let removed = tx.delete_occurrences(master_id);
    let drafts = OccurrenceExpander::materialize(&master, rule.as_ref(), horizon);
    let count = drafts.len();
    for draft in drafts {
        tx.insert_event(draft, now)?;
    }

    tracing::debug!(
        master = %master.uuid,
        removed,
        generated = count,
        "regenerated occurrences"
    );
    Ok(count)
}

/// Store a new master event and its rule. Occurrences are not generated.
pub fn save_master(
    tx: &mut Transaction<'_>,
    draft: NewEvent,
    rule: Option<RecurrenceRule>,
    now: DateTime<Utc>,
) -> EventCalResult<Event> {
    if draft.master_id.is_some() {
        return Err(EventCalError::Validation(
            "a master event cannot belong to another master".into(),
        ));
    }
    let master = tx.insert_event(draft, now)?;
    if let Some(rule) = rule.filter(|rule| rule.active) {
        tx.add_rule(master.id, rule)?;
    }
    Ok(master)
}

/// Store changes to a master event and replace its rule.
///
/// Returns whether the schedule (span or rule) changed, in which case the
/// caller must regenerate occurrences. An unchanged rule is left in place; a
/// changed one is deactivated and kept for history.
pub fn update_master(
    tx: &mut Transaction<'_>,
    event: Event,
    rule: Option<RecurrenceRule>,
    now: DateTime<Utc>,
) -> EventCalResult<bool> {
    let stored = tx.event(event.id)?;
    if !stored.is_master() {
        return Err(EventCalError::Validation(format!(
            "event {} is an occurrence, not a master",
            event.id
        )));
    }
    let span_changed = stored.span != event.span;

    let rule = rule.filter(|rule| rule.active);
    let rule_changed = match (tx.active_rule(event.id), &rule) {
        (None, None) => false,
        (Some(current), Some(new)) => !current.same_schedule(new),
        _ => true,
    };

    let id = event.id;
    tx.update_event(event, now)?;
    if rule_changed {
        tx.deactivate_rules(id);
        if let Some(rule) = rule {
            tx.add_rule(id, rule)?;
        }
    }

    Ok(span_changed || rule_changed)
}

impl Store {
    /// Save a master with its rule and generate its occurrences, atomically.
    pub fn save_master_and_regenerate(
        &self,
        draft: NewEvent,
        rule: Option<RecurrenceRule>,
        horizon: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EventCalResult<Event> {
        self.transaction(|tx| {
            let master = save_master(tx, draft, rule, now)?;
            regenerate_occurrences(tx, master.id, horizon, now)?;
            Ok(master)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::NewCalendar;
    use crate::recurrence::{Frequency, Limit};
    use chrono::{Datelike, Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn far_horizon() -> DateTime<Utc> {
        utc(2100, 1, 1, 0, 0)
    }

    fn standup() -> TimeSpan {
        // Monday
        TimeSpan::new(utc(2024, 1, 1, 9, 0), Some(utc(2024, 1, 1, 9, 15)), false).unwrap()
    }

    #[test]
    fn test_standup_weekly_count_four() {
        let rule = RecurrenceRule::new(Frequency::Weekly, 1, Limit::Count(4)).unwrap();
        let spans = expand(&standup(), Some(&rule), far_horizon());

        let starts: Vec<_> = spans.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![utc(2024, 1, 8, 9, 0), utc(2024, 1, 15, 9, 0), utc(2024, 1, 22, 9, 0)]
        );
        assert!(spans.iter().all(|s| s.duration() == Duration::minutes(15)));
    }

    #[test]
    fn test_count_rule_generates_count_minus_one() {
        for count in 1..=10 {
            for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly, Frequency::Yearly] {
                let rule = RecurrenceRule::new(frequency, 2, Limit::Count(count)).unwrap();
                let spans = expand(&standup(), Some(&rule), far_horizon());
                assert_eq!(spans.len(), count as usize - 1, "{frequency:?} count {count}");
            }
        }
    }

    #[test]
    fn test_never_beyond_horizon() {
        let horizon = utc(2024, 3, 1, 0, 0);
        let rules = [
            RecurrenceRule::new(Frequency::Daily, 1, Limit::Unbounded).unwrap(),
            RecurrenceRule::new(Frequency::Weekly, 1, Limit::Count(500)).unwrap(),
            RecurrenceRule::new(Frequency::Daily, 3, Limit::Until(utc(2030, 1, 1, 0, 0))).unwrap(),
        ];
        for rule in &rules {
            let spans = expand(&standup(), Some(rule), horizon);
            assert!(!spans.is_empty());
            assert!(spans.iter().all(|s| s.start <= horizon));
        }
    }

    #[test]
    fn test_monthly_from_31st_lands_on_month_ends() {
        let span = TimeSpan::at(utc(2024, 1, 31, 18, 0));
        let rule = RecurrenceRule::new(Frequency::Monthly, 1, Limit::Count(12)).unwrap();
        for occurrence in expand(&span, Some(&rule), far_horizon()) {
            let date = occurrence.start.date_naive();
            let next_day = date + Duration::days(1);
            assert!(date.day() == 31 || next_day.month() != date.month(), "{date}");
        }
    }

    #[test]
    fn test_absent_or_inactive_rule_yields_nothing() {
        assert!(expand(&standup(), None, far_horizon()).is_empty());

        let mut rule = RecurrenceRule::new(Frequency::Daily, 1, Limit::Count(5)).unwrap();
        rule.active = false;
        assert!(expand(&standup(), Some(&rule), far_horizon()).is_empty());
    }

    #[test]
    fn test_all_day_flag_is_preserved() {
        let span = TimeSpan::all_day_on(chrono::NaiveDate::from_ymd_opt(2024, 2, 24).unwrap());
        let rule = RecurrenceRule::new(Frequency::Yearly, 1, Limit::Count(3)).unwrap();
        let spans = expand(&span, Some(&rule), far_horizon());
        assert!(spans.iter().all(|s| s.all_day && s.is_all_day()));
    }

    #[test]
    fn test_save_and_regenerate_replaces_children() {
        let store = Store::in_memory();
        let now = utc(2023, 12, 1, 0, 0);
        let calendar = store
            .transaction(|tx| tx.insert_calendar(NewCalendar::new("Team")))
            .unwrap();

        let rule = RecurrenceRule::new(Frequency::Weekly, 1, Limit::Count(4)).unwrap();
        let master = store
            .save_master_and_regenerate(
                NewEvent::new(calendar.id, "Standup", standup()),
                Some(rule),
                far_horizon(),
                now,
            )
            .unwrap();

        let occurrences = store.occurrences_of(master.id);
        assert_eq!(occurrences.len(), 3);
        assert!(occurrences.iter().all(|o| o.uuid != master.uuid && o.title == "Standup"));

        // moving the master an hour later moves every occurrence
        let mut moved = master.clone();
        moved.span = moved.span.shift(Duration::hours(1));
        let changed = store
            .transaction(|tx| {
                let changed = update_master(tx, moved, Some(rule), now)?;
                if changed {
                    regenerate_occurrences(tx, master.id, far_horizon(), now)?;
                }
                Ok(changed)
            })
            .unwrap();
        assert!(changed);
        let starts: Vec<_> = store.occurrences_of(master.id).iter().map(|o| o.span.start).collect();
        assert_eq!(starts[0], utc(2024, 1, 8, 10, 0));
        assert_eq!(starts.len(), 3);
    }

    #[test]
    fn test_update_master_detects_unchanged_schedule() {
        let store = Store::in_memory();
        let now = utc(2023, 12, 1, 0, 0);
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Limit::Count(3)).unwrap();
        let master = store
            .transaction(|tx| {
                let calendar = tx.insert_calendar(NewCalendar::new("Team"))?;
                save_master(tx, NewEvent::new(calendar.id, "Standup", standup()), Some(rule), now)
            })
            .unwrap();

        let mut renamed = master.clone();
        renamed.title = "Daily standup".into();
        let changed = store
            .transaction(|tx| update_master(tx, renamed, Some(rule), now))
            .unwrap();
        assert!(!changed);
        assert_eq!(store.rules_for(master.id).len(), 1);

        // dropping the rule is a schedule change and keeps the old rule inactive
        let changed = store
            .transaction(|tx| update_master(tx, master.clone(), None, now))
            .unwrap();
        assert!(changed);
        assert_eq!(store.active_rule(master.id), None);
        assert_eq!(store.rules_for(master.id).len(), 1);
    }

    #[test]
    fn test_dropping_the_rule_clears_occurrences() {
        let store = Store::in_memory();
        let now = utc(2023, 12, 1, 0, 0);
        let rule = RecurrenceRule::new(Frequency::Daily, 1, Limit::Count(3)).unwrap();
        let calendar = store
            .transaction(|tx| tx.insert_calendar(NewCalendar::new("Team")))
            .unwrap();
        let master = store
            .save_master_and_regenerate(
                NewEvent::new(calendar.id, "Standup", standup()),
                Some(rule),
                far_horizon(),
                now,
            )
            .unwrap();
        assert_eq!(store.occurrences_of(master.id).len(), 2);

        let remaining = store
            .transaction(|tx| {
                update_master(tx, master.clone(), None, now)?;
                regenerate_occurrences(tx, master.id, far_horizon(), now)
            })
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(store.occurrences_of(master.id).is_empty());
        assert!(store.event(master.id).is_some());
    }
}
