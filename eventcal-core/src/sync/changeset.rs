//! Changeset computation and application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::calendar::{Calendar, CalendarId};
use crate::error::{EventCalError, EventCalResult};
use crate::event::{Event, EventStatus, NewEvent};
use crate::expand::{regenerate_occurrences, save_master, update_master};
use crate::feed::{FeedDocument, FeedEntry};
use crate::store::Transaction;
use crate::sync::{DiffKind, EntryDiff};
use crate::venue::{VenueLookup, resolve_location};

/// Counts of what one reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Entries left alone because the local copy is as new or newer.
    pub skipped: usize,
}

impl Summary {
    fn record(&mut self, kind: DiffKind) {
        match kind {
            DiffKind::Create => self.created += 1,
            DiffKind::Update => self.updated += 1,
            DiffKind::Delete => self.deleted += 1,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created, self.updated, self.deleted, self.skipped
        )
    }
}

/// The differences between a feed and the events it previously imported.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    pub calendar_id: CalendarId,
    pub diffs: Vec<EntryDiff>,
    pub skipped: usize,
    /// Identities of every entry in the feed.
    pub seen: BTreeSet<String>,
}

impl Changeset {
    /// Diff `feed` against the master events of `calendar`.
    ///
    /// Entries are matched to local masters by identity. Only imported masters
    /// the feed no longer lists are deleted; locally authored events are never
    /// removed by a feed. A feed naming the same identity twice is rejected.
    pub fn between(
        calendar: &Calendar,
        local_masters: &[&Event],
        feed: &FeedDocument,
    ) -> EventCalResult<Changeset> {
        let local_by_uuid: HashMap<&str, &Event> = local_masters
            .iter()
            .filter(|event| event.calendar_id == calendar.id && event.is_master())
            .map(|event| (event.uuid.as_str(), *event))
            .collect();

        let mut seen = BTreeSet::new();
        let mut diffs = Vec::new();
        let mut skipped = 0;

        for entry in &feed.entries {
            let uuid = entry.identity(calendar);
            if !seen.insert(uuid.clone()) {
                return Err(EventCalError::DuplicateFeedEntry(uuid));
            }

            let local = local_by_uuid.get(uuid.as_str()).copied();
            match EntryDiff::get_diff(uuid, local, Some(entry)) {
                Some(diff) => diffs.push(diff),
                None => {
                    tracing::debug!(title = %entry.title, "local copy is up to date");
                    skipped += 1;
                }
            }
        }

        let mut vanished: Vec<&Event> = local_by_uuid
            .values()
            .filter(|event| event.status == EventStatus::Imported && !seen.contains(&event.uuid))
            .copied()
            .collect();
        vanished.sort_by_key(|event| event.id);
        diffs.extend(
            vanished
                .into_iter()
                .filter_map(|event| EntryDiff::get_diff(event.uuid.clone(), Some(event), None)),
        );

        Ok(Changeset {
            calendar_id: calendar.id,
            diffs,
            skipped,
            seen,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// What applying this changeset will report.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            skipped: self.skipped,
            ..Summary::default()
        };
        for diff in &self.diffs {
            summary.record(diff.kind);
        }
        summary
    }

    /// Apply every diff inside `tx`, regenerating occurrences as needed.
    ///
    /// Occurrences carry copies of their master's descriptive fields, so every
    /// created or updated master has its occurrences regenerated.
    pub fn apply(
        self,
        tx: &mut Transaction<'_>,
        venues: &dyn VenueLookup,
        horizon: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EventCalResult<Summary> {
        let summary = self.summary();

        for diff in self.diffs {
            match (diff.kind, diff.entry, diff.local) {
                (DiffKind::Create, Some(entry), _) => {
                    let rule = entry.recurrence;
                    let draft = imported_draft(self.calendar_id, diff.uuid, entry, venues);
                    let master = save_master(tx, draft, rule, now)?;
                    regenerate_occurrences(tx, master.id, horizon, now)?;
                }
                (DiffKind::Update, Some(entry), Some(mut local)) => {
                    let rule = entry.recurrence;
                    local.location = entry
                        .location
                        .as_deref()
                        .and_then(|text| resolve_location(text, venues));
                    local.title = entry.title;
                    local.description = entry.description;
                    local.url = entry.url;
                    local.span = entry.span;

                    let id = local.id;
                    update_master(tx, local, rule, now)?;
                    regenerate_occurrences(tx, id, horizon, now)?;
                }
                (DiffKind::Delete, _, Some(local)) => {
                    tx.delete_event(local.id)?;
                }
                (kind, _, _) => {
                    return Err(EventCalError::Validation(format!(
                        "incomplete {kind} change for '{}'",
                        diff.uuid
                    )));
                }
            }
        }

        Ok(summary)
    }
}

fn imported_draft(
    calendar_id: CalendarId,
    uuid: String,
    entry: FeedEntry,
    venues: &dyn VenueLookup,
) -> NewEvent {
    NewEvent {
        location: entry
            .location
            .as_deref()
            .and_then(|text| resolve_location(text, venues)),
        uuid: Some(uuid),
        calendar_id,
        title: entry.title,
        description: entry.description,
        url: entry.url,
        span: entry.span,
        status: EventStatus::Imported,
        external_ref: entry.external_id,
        master_id: None,
    }
}
