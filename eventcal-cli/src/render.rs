//! TUI rendering traits for eventcal types.
//!
//! This module provides extension traits that add colored terminal rendering
//! to eventcal-core types using owo_colors.

use eventcal_core::describe::describe_rule;
use eventcal_core::sync::Summary;
use eventcal_core::venue::Venue;
use eventcal_core::{Calendar, Event, EventStatus, Location, RecurrenceRule, TimeSpan};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Calendar {
    fn render(&self) -> String {
        match &self.category {
            Some(category) => format!("📅 {} {}", self.slug, format!("({category})").dimmed()),
            None => format!("📅 {}", self.slug),
        }
    }
}

impl Render for EventStatus {
    fn render(&self) -> String {
        let label = self.to_string();
        match self {
            EventStatus::Draft => label.dimmed().to_string(),
            EventStatus::Submitted => label.yellow().to_string(),
            EventStatus::Published => label.green().to_string(),
            EventStatus::Imported => label.cyan().to_string(),
        }
    }
}

impl Render for Summary {
    fn render(&self) -> String {
        if self.is_unchanged() {
            return "   No changes".dimmed().to_string();
        }

        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("+{} new", self.created).green().to_string());
        }
        if self.updated > 0 {
            parts.push(format!("~{} changed", self.updated).yellow().to_string());
        }
        if self.deleted > 0 {
            parts.push(format!("-{} deleted", self.deleted).red().to_string());
        }
        format!("   {}", parts.join(", "))
    }
}

/// When a span happens, in a compact form.
pub fn render_span(span: &TimeSpan) -> String {
    if span.all_day {
        let first = span.start_date();
        // all-day ends are exclusive midnights
        let last = span.end.map(|end| (end - chrono::Duration::seconds(1)).date_naive());
        return match last {
            Some(last) if last > first => format!("{} – {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")),
            _ => format!("{} (all day)", first.format("%Y-%m-%d")),
        };
    }

    let start = span.start.format("%Y-%m-%d %H:%M");
    match span.end {
        Some(end) if span.within_single_day() => format!("{start}–{}", end.format("%H:%M")),
        Some(end) => format!("{start} – {}", end.format("%Y-%m-%d %H:%M")),
        None => start.to_string(),
    }
}

pub fn render_location(location: &Location, venues: &[Venue]) -> String {
    match location {
        Location::Text(text) => text.clone(),
        Location::Venue(id) => venues
            .iter()
            .find(|venue| venue.id == *id)
            .map(|venue| venue.title.clone())
            .unwrap_or_else(|| format!("venue {id}")),
    }
}

/// One line for an event in a listing.
pub fn render_event(event: &Event, rule: Option<&RecurrenceRule>, venues: &[Venue]) -> String {
    let mut line = format!("   {} {}", render_span(&event.span).dimmed(), event.title);

    if let Some(location) = &event.location {
        line.push_str(&format!(" @ {}", render_location(location, venues)));
    }
    if let Some(rule) = rule {
        line.push_str(&format!(" {}", format!("({})", describe_rule(rule)).dimmed()));
    }
    if event.status != EventStatus::Published {
        line.push_str(&format!(" [{}]", event.status.render()));
    }
    line
}
