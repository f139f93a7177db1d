use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::feed::FeedEntry;

/// What a feed entry does to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// The entry is new: import it.
    Create,
    /// The entry is newer than the local copy.
    Update,
    /// An imported event the feed no longer lists.
    Delete,
}

impl DiffKind {
    /// Classify a local copy against the feed's entry.
    ///
    /// `None` when there is nothing to do, including when the local copy is as
    /// new as the entry or newer.
    pub fn classify(local: Option<&Event>, entry: Option<&FeedEntry>) -> Option<DiffKind> {
        match (local, entry) {
            (None, Some(_)) => Some(DiffKind::Create),
            (Some(_), None) => Some(DiffKind::Delete),
            (Some(local), Some(entry)) if entry.last_modified > local.updated_at => Some(DiffKind::Update),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            DiffKind::Create => '+',
            DiffKind::Update => '~',
            DiffKind::Delete => '-',
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            DiffKind::Create => "import",
            DiffKind::Update => "update",
            DiffKind::Delete => "remove",
        };
        f.write_str(verb)
    }
}

/// One change a feed asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDiff {
    pub kind: DiffKind,
    /// Identity of the event in the local store.
    pub uuid: String,
    pub entry: Option<FeedEntry>,
    pub local: Option<Event>,
}

impl fmt::Display for EntryDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.symbol(), self.kind, self.title())
    }
}

impl EntryDiff {
    /// The change needed to bring `local` in line with `entry`, if any.
    ///
    /// An entry only replaces a local copy it is strictly newer than; the last
    /// writer by timestamp wins.
    pub fn get_diff(
        uuid: String,
        local: Option<&Event>,
        entry: Option<&FeedEntry>,
    ) -> Option<EntryDiff> {
        let kind = DiffKind::classify(local, entry)?;
        Some(EntryDiff {
            kind,
            uuid,
            entry: entry.cloned(),
            local: local.cloned(),
        })
    }

    /// Title of the event (prefer the feed's, fall back to the local one).
    pub fn title(&self) -> &str {
        self.entry
            .as_ref()
            .map(|entry| entry.title.as_str())
            .or(self.local.as_ref().map(|local| local.title.as_str()))
            .unwrap_or(self.uuid.as_str())
    }
}
