//! Recurrence rules and the instants they generate.
//!
//! Only the FREQ, INTERVAL, UNTIL and COUNT parts of an RFC 5545 rule are
//! modeled. A rule enumerates candidate start instants lazily from an anchor
//! (the master event's start); truncation by count, date limit or horizon is
//! applied on top of that sequence.

mod rrule;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventCalError, EventCalResult};

pub use rrule::RruleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// `anchor` advanced by `n` units of this frequency.
    ///
    /// Calendar months and years keep the anchor's day of month, clamped to the
    /// last day of shorter months.
    fn advance(self, anchor: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        match self {
            Frequency::Daily => anchor.checked_add_signed(Duration::days(i64::from(n))),
            Frequency::Weekly => anchor.checked_add_signed(Duration::weeks(i64::from(n))),
            Frequency::Monthly => anchor.checked_add_months(Months::new(n)),
            Frequency::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }

    pub fn as_rrule_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    /// The adverb form: "daily", "weekly", ...
    pub fn adverb(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// The unit noun: "day", "week", ...
    pub fn unit(self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

/// How a rule terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", content = "value", rename_all = "lowercase")]
pub enum Limit {
    /// Repeats until the caller's horizon.
    Unbounded,
    /// Total number of instances, the master's own instance included.
    Count(u32),
    /// Last instant an instance may start at.
    Until(DateTime<Utc>),
}

/// The termination basis of a rule, without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    None,
    Count,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub limit: Limit,
    /// Inactive rules are kept for history and never materialize occurrences.
    pub active: bool,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: u32, limit: Limit) -> EventCalResult<Self> {
        if interval == 0 {
            return Err(EventCalError::Validation(
                "recurrence interval must be at least 1".into(),
            ));
        }
        if limit == Limit::Count(0) {
            return Err(EventCalError::Validation(
                "recurrence count must be at least 1".into(),
            ));
        }
        Ok(RecurrenceRule {
            frequency,
            interval,
            limit,
            active: true,
        })
    }

    pub fn basis(&self) -> Basis {
        match self.limit {
            Limit::Unbounded => Basis::None,
            Limit::Count(_) => Basis::Count,
            Limit::Until(_) => Basis::Limit,
        }
    }

    pub fn limiting_count(&self) -> Option<u32> {
        match self.limit {
            Limit::Count(n) => Some(n),
            _ => None,
        }
    }

    pub fn limiting_date(&self) -> Option<DateTime<Utc>> {
        match self.limit {
            Limit::Until(until) => Some(until),
            _ => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == Limit::Unbounded
    }

    /// A rule that only ever produces the master's own instance.
    pub fn is_single(&self) -> bool {
        self.limit == Limit::Count(1)
    }

    /// Same schedule, ignoring the active flag.
    pub fn same_schedule(&self, other: &RecurrenceRule) -> bool {
        self.frequency == other.frequency && self.interval == other.interval && self.limit == other.limit
    }

    /// Every candidate start instant from `anchor` on, the anchor first.
    pub fn starts(&self, anchor: DateTime<Utc>) -> Starts {
        Starts {
            anchor,
            frequency: self.frequency,
            interval: self.interval,
            step: 0,
        }
    }

    /// The instants this rule produces from `anchor`, the anchor included.
    ///
    /// Stops at the count limit, past the date limit or past `horizon`,
    /// whichever comes first. The horizon is mandatory so an unbounded rule can
    /// never be expanded forever.
    pub fn instances(
        &self,
        anchor: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> impl Iterator<Item = DateTime<Utc>> + use<> {
        let until = self.limiting_date();
        let count = self
            .limiting_count()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);

        self.starts(anchor)
            .take(count)
            .take_while(move |instant| until.is_none_or(|u| *instant <= u) && *instant <= horizon)
    }
}

/// Lazy, unbounded sequence of candidate start instants.
///
/// Instance `k` is computed from the anchor rather than from instance `k - 1`,
/// so month-end clamping never drifts (31 Jan, 29 Feb, 31 Mar, ...).
#[derive(Debug, Clone)]
pub struct Starts {
    anchor: DateTime<Utc>,
    frequency: Frequency,
    interval: u32,
    step: u32,
}

impl Iterator for Starts {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let units = self.step.checked_mul(self.interval)?;
        self.step = self.step.checked_add(1)?;
        self.frequency.advance(self.anchor, units)
    }
}
