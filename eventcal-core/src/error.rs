//! Error types for the eventcal ecosystem.

use thiserror::Error;

/// Errors that can occur in eventcal operations.
#[derive(Error, Debug)]
pub enum EventCalError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate uuid: {0}")]
    DuplicateUuid(String),

    #[error("Duplicate calendar: {0}")]
    DuplicateCalendar(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("No subscription configured for calendar '{0}'")]
    NoSubscription(String),

    #[error("Feed fetch error: {0}")]
    Fetch(String),

    #[error("Feed fetch timed out after {0}s")]
    FetchTimeout(u64),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Feed lists '{0}' more than once")]
    DuplicateFeedEntry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EventCalError {
    /// Whether this error came out of fetching, parsing or reconciling a feed.
    ///
    /// These leave local data untouched, so an opportunistic refresh may log
    /// them and carry on serving what is already stored.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            EventCalError::Fetch(_)
                | EventCalError::FetchTimeout(_)
                | EventCalError::Parse(_)
                | EventCalError::DuplicateFeedEntry(_)
                | EventCalError::DuplicateUuid(_)
                | EventCalError::Validation(_)
        )
    }
}

/// Result type alias for eventcal operations.
pub type EventCalResult<T> = Result<T, EventCalError>;
