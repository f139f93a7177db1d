//! Reconciliation of subscription feeds against locally stored events.

mod changeset;
mod entry_diff;
mod reconcile;

pub use changeset::{Changeset, Summary};
pub use entry_diff::{DiffKind, EntryDiff};
pub use reconcile::reconcile;
