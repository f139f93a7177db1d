//! Calendars and their feed subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{EventCalError, EventCalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(pub u64);

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub name: String,
    /// Unique within `category`.
    pub slug: String,
    pub category: Option<String>,
    pub subscription: Option<Subscription>,
}

impl Calendar {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

/// A calendar that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalendar {
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    pub category: Option<String>,
    pub subscription: Option<Subscription>,
}

impl NewCalendar {
    pub fn new(name: impl Into<String>) -> Self {
        NewCalendar {
            name: name.into(),
            slug: None,
            category: None,
            subscription: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// The slug this calendar will be stored under.
    pub fn resolved_slug(&self) -> EventCalResult<String> {
        let slug = match &self.slug {
            Some(slug) => slug::slugify(slug),
            None => slug::slugify(&self.name),
        };
        if self.name.trim().is_empty() || slug.is_empty() {
            return Err(EventCalError::Validation(format!(
                "'{}' is not a usable calendar name",
                self.name
            )));
        }
        Ok(slug)
    }
}

/// Basic-auth credentials for a feed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A remote feed imported into one calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub url: String,
    pub credentials: Option<Credentials>,
    /// Falls back to the configured default when unset. Zero means manual refresh only.
    pub refresh_interval: Option<Duration>,
    pub last_refresh_date: Option<DateTime<Utc>>,
    /// Number of feed entries seen by the last successful refresh.
    pub last_refresh_count: usize,
}

impl Subscription {
    pub fn new(url: impl Into<String>) -> Self {
        Subscription {
            url: url.into(),
            credentials: None,
            refresh_interval: None,
            last_refresh_date: None,
            last_refresh_count: 0,
        }
    }

    pub fn effective_interval(&self, default_interval: Duration) -> Duration {
        self.refresh_interval.unwrap_or(default_interval)
    }

    /// Never refreshed, or the refresh interval has elapsed since the last one.
    pub fn needs_refreshment(&self, now: DateTime<Utc>, default_interval: Duration) -> bool {
        let Some(last) = self.last_refresh_date else {
            return true;
        };
        let Ok(interval) = chrono::Duration::from_std(self.effective_interval(default_interval))
        else {
            return false;
        };
        last.checked_add_signed(interval).is_some_and(|due| now > due)
    }

    /// Whether background checks should refresh this feed at all.
    pub fn refresh_automatically(&self, default_interval: Duration) -> bool {
        !self.effective_interval(default_interval).is_zero()
    }

    pub fn mark_refreshed(&mut self, now: DateTime<Utc>, count: usize) {
        self.last_refresh_date = Some(now);
        self.last_refresh_count = count;
    }
}
