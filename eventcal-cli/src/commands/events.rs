use anyhow::Result;
use chrono::Utc;
use eventcal_core::describe::describe_period;
use eventcal_core::store::EventQuery;
use eventcal_core::{Calendar, EventStatus};
use owo_colors::OwoColorize;

use crate::App;
use crate::render::{Render, render_event};
use crate::utils::dates::period_from_args;

pub async fn run(
    app: &App,
    calendars: Vec<Calendar>,
    from: Option<&str>,
    to: Option<&str>,
    status: Option<&str>,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    let period = period_from_args(from, to, now)?;

    // reads bring stale subscriptions up to date first; feed failures keep what is stored
    for calendar in &calendars {
        app.refresh_if_stale(calendar.id, now).await?;
    }

    let mut query = EventQuery::new()
        .in_calendars(calendars.iter().map(|c| c.id))
        .between(period);
    if let Some(status) = status {
        query = query.with_status(status.parse::<EventStatus>()?);
    }

    let store = app.store();
    let events = store.query(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    let venues = store.venues();
    for (i, calendar) in calendars.iter().enumerate() {
        println!("{}", calendar.render());

        let in_calendar: Vec<_> = events.iter().filter(|e| e.calendar_id == calendar.id).collect();
        if in_calendar.is_empty() {
            println!("   {}", format!("No events {}", describe_period(&period)).dimmed());
        }

        for event in in_calendar {
            let rule = if event.is_master() { store.active_rule(event.id) } else { None };
            println!("{}", render_event(event, rule.as_ref(), &venues));
        }

        if i < calendars.len() - 1 {
            println!();
        }
    }

    Ok(())
}
