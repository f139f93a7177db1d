use chrono::{DateTime, Utc};

use crate::calendar::CalendarId;
use crate::error::{EventCalError, EventCalResult};
use crate::feed::FeedDocument;
use crate::store::Store;
use crate::sync::{Changeset, Summary};
use crate::venue::VenueLookup;

/// Bring the events imported into `calendar_id` in line with `feed`.
///
/// Diffing, applying and recording the refresh happen in one store
/// transaction: on any error nothing changes, including the subscription's
/// last refresh date, so the next staleness check retries.
pub fn reconcile(
    store: &Store,
    calendar_id: CalendarId,
    feed: &FeedDocument,
    venues: &dyn VenueLookup,
    horizon: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EventCalResult<Summary> {
    let (slug, summary) = store.transaction(|tx| {
        let changeset = {
            let calendar = tx.calendar(calendar_id)?;
            if calendar.subscription.is_none() {
                return Err(EventCalError::NoSubscription(calendar.slug.clone()));
            }
            let masters = tx.masters(calendar_id);
            Changeset::between(calendar, &masters, feed)?
        };

        for diff in &changeset.diffs {
            tracing::debug!(%diff, "applying feed change");
        }

        let seen = changeset.seen.len();
        let summary = changeset.apply(tx, venues, horizon, now)?;
        tx.mark_refreshed(calendar_id, now, seen)?;

        Ok((tx.calendar(calendar_id)?.slug.clone(), summary))
    })?;

    tracing::info!(
        calendar = %slug,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        skipped = summary.skipped,
        "reconciled feed"
    );
    Ok(summary)
}
