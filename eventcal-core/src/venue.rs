//! Known venues and matching free-text locations against them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub u64);

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub title: String,
    pub address: Option<String>,
    pub postcode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVenue {
    pub title: String,
    pub address: Option<String>,
    pub postcode: Option<String>,
}

impl NewVenue {
    pub fn new(title: impl Into<String>) -> Self {
        NewVenue {
            title: title.into(),
            address: None,
            postcode: None,
        }
    }
}

/// Lookup of venues by their exact title.
pub trait VenueLookup {
    fn find_venue_by_title(&self, title: &str) -> Option<&Venue>;
}

impl VenueLookup for Vec<Venue> {
    fn find_venue_by_title(&self, title: &str) -> Option<&Venue> {
        self.iter().find(|venue| venue.title == title)
    }
}

/// A structured venue reference when `text` names a known venue, the raw text
/// otherwise. Blank text has no location.
pub fn resolve_location(text: &str, venues: &dyn VenueLookup) -> Option<Location> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(match venues.find_venue_by_title(text) {
        Some(venue) => Location::Venue(venue.id),
        None => Location::Text(text.to_string()),
    })
}
