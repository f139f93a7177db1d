use anyhow::Result;
use chrono::Utc;
use eventcal_core::Calendar;
use eventcal_core::sync::Summary;
use owo_colors::OwoColorize;

use crate::App;
use crate::render::Render;
use crate::utils::tui::Spinner;

pub async fn run(app: &App, calendars: Vec<Calendar>, force: bool) -> Result<()> {
    let subscribed: Vec<Calendar> = calendars.into_iter().filter(Calendar::is_subscribed).collect();
    if subscribed.is_empty() {
        println!("{}", "No subscribed calendars to refresh".dimmed());
        return Ok(());
    }

    let now = Utc::now();
    let mut total = Summary::default();
    let mut failures = 0;

    for (i, cal) in subscribed.iter().enumerate() {
        let spinner = Spinner::start(cal.render());
        let result = if force {
            app.refresh(cal.id, now).await.map(Some)
        } else {
            app.refresh_if_due(cal.id, now).await
        };
        spinner.stop();

        println!("{}", cal.render());

        match result {
            Ok(Some(summary)) => {
                println!("{}", summary.render());
                total.created += summary.created;
                total.updated += summary.updated;
                total.deleted += summary.deleted;
                total.skipped += summary.skipped;
            }
            Ok(None) => println!("   {}", "Up to date (use --force to refresh anyway)".dimmed()),
            Err(e) => {
                failures += 1;
                println!("   {}", e.to_string().red());
            }
        }

        // Add spacing between calendars (but not after the last one)
        if i < subscribed.len() - 1 {
            println!();
        }
    }

    if !total.is_unchanged() {
        println!("\nRefreshed: {total}");
    }

    if failures > 0 {
        anyhow::bail!("{} of {} feeds could not be refreshed", failures, subscribed.len());
    }

    Ok(())
}
