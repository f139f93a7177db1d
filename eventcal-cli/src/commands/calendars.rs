use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::App;
use crate::render::Render;

pub fn run(app: &App) -> Result<()> {
    let calendars = app.store().calendars();
    if calendars.is_empty() {
        println!("{}", "No calendars yet. Add one with: eventcal add <name>".dimmed());
        return Ok(());
    }

    let now = Utc::now();
    let default_interval = app.settings().refresh_interval;

    for calendar in &calendars {
        println!("{}  {}", calendar.render(), calendar.name.dimmed());

        let Some(subscription) = &calendar.subscription else {
            continue;
        };

        println!("   {}", subscription.url);

        let schedule = if subscription.refresh_automatically(default_interval) {
            let interval = subscription.effective_interval(default_interval);
            format!("refreshes every {}", humantime::format_duration(interval))
        } else {
            "refreshed manually".to_string()
        };

        let last = match subscription.last_refresh_date {
            Some(date) => format!(
                "last refreshed {} ({} events)",
                date.format("%Y-%m-%d %H:%M"),
                subscription.last_refresh_count
            ),
            None => "never refreshed".to_string(),
        };

        let stale = if subscription.needs_refreshment(now, default_interval) {
            format!(", {}", "stale".yellow())
        } else {
            String::new()
        };

        println!("   {}", format!("{schedule}, {last}").dimmed().to_string() + &stale);
    }

    Ok(())
}
