use std::time::Duration;

use anyhow::{Context, Result};
use eventcal_core::{Credentials, NewCalendar, Subscription};
use owo_colors::OwoColorize;

use crate::App;
use crate::render::Render;

pub fn run(
    app: &App,
    name: String,
    category: Option<String>,
    url: Option<String>,
    username: Option<String>,
    interval: Option<Duration>,
) -> Result<()> {
    let mut new = NewCalendar::new(name);
    if let Some(category) = category {
        new = new.with_category(category);
    }

    if let Some(url) = url {
        let mut subscription = Subscription::new(url);
        subscription.refresh_interval = interval;

        if let Some(username) = username {
            let password = rpassword::prompt_password(format!("  Password for {username}: "))
                .context("Could not read password")?;
            subscription.credentials = Some(Credentials { username, password });
        }

        new = new.with_subscription(subscription);
    }

    let calendar = app.store().transaction(|tx| tx.insert_calendar(new))?;

    println!("{} Added {}", "✓".green(), calendar.render());
    if calendar.is_subscribed() {
        println!(
            "{}",
            format!("  Fetch its events with: eventcal refresh -c {}", calendar.slug).dimmed()
        );
    }

    Ok(())
}
