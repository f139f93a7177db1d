mod commands;
mod render;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use eventcal_core::client::{HttpFetcher, Refresher, SubscriptionClient};
use eventcal_core::ics::IcsParser;
use eventcal_core::{Calendar, Settings, Store};
use tracing_subscriber::EnvFilter;

use crate::commands::new::Repeat;

/// The refresher every command works through.
pub type App = Refresher<HttpFetcher, IcsParser>;

#[derive(Parser)]
#[command(name = "eventcal")]
#[command(about = "Keep calendars of recurring events and follow ICS subscriptions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List calendars and their subscriptions
    Calendars,
    /// Add a calendar, optionally subscribed to a remote feed
    Add {
        name: String,

        #[arg(long)]
        category: Option<String>,

        /// Feed URL (https:// or webcal://)
        #[arg(long)]
        url: Option<String>,

        /// Username for a password protected feed (the password is prompted)
        #[arg(long, requires = "url")]
        username: Option<String>,

        /// How often to refresh the feed, e.g. "30m" or "1day" ("0s" for manual only)
        #[arg(long, requires = "url", value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },
    /// Fetch subscribed feeds and apply their changes
    Refresh {
        /// Only operate on this calendar (by slug)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Refresh even if the subscription is not stale yet
        #[arg(long)]
        force: bool,
    },
    /// List events
    Events {
        /// Only operate on this calendar (by slug)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Show events from this date (YYYY-MM-DD, or "start" for all past events)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only events with this status (draft, submitted, published, imported)
        #[arg(long)]
        status: Option<String>,

        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an event, optionally repeating
    New {
        title: String,

        /// Calendar to add the event to (by slug)
        #[arg(short, long)]
        calendar: String,

        /// Start date or date/time (e.g. "2025-03-20" or "2025-03-20T15:00")
        #[arg(short, long)]
        start: String,

        /// End date or date/time; defaults to one hour (or one day) after the start
        #[arg(short, long)]
        end: Option<String>,

        /// Treat the dates as whole days
        #[arg(long)]
        all_day: bool,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Publish the event right away instead of keeping it as a draft
        #[arg(long)]
        publish: bool,

        #[arg(long, value_enum)]
        repeat: Option<Repeat>,

        /// Repeat every N days/weeks/months/years
        #[arg(long, default_value_t = 1, requires = "repeat")]
        interval: u32,

        /// Stop after this many events (the first one included)
        #[arg(long, requires = "repeat", conflicts_with = "until")]
        count: Option<u32>,

        /// Stop repeating after this date (YYYY-MM-DD)
        #[arg(long, requires = "repeat")]
        until: Option<String>,
    },
    /// Print a calendar as an ICS document
    Export {
        /// Calendar to export (by slug)
        #[arg(short, long)]
        calendar: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = open_app(settings)?;

    match cli.command {
        Commands::Calendars => commands::calendars::run(&app),
        Commands::Add {
            name,
            category,
            url,
            username,
            interval,
        } => commands::add::run(&app, name, category, url, username, interval),
        Commands::Refresh { calendar, force } => {
            let calendars = resolve_calendars(&app, calendar.as_deref())?;
            commands::refresh::run(&app, calendars, force).await
        }
        Commands::Events {
            calendar,
            from,
            to,
            status,
            json,
        } => {
            let calendars = resolve_calendars(&app, calendar.as_deref())?;
            commands::events::run(
                &app,
                calendars,
                from.as_deref(),
                to.as_deref(),
                status.as_deref(),
                json,
            )
            .await
        }
        Commands::New {
            title,
            calendar,
            start,
            end,
            all_day,
            location,
            description,
            publish,
            repeat,
            interval,
            count,
            until,
        } => {
            let calendar = resolve_calendar(&app, &calendar)?;
            commands::new::run(
                &app,
                calendar,
                commands::new::NewArgs {
                    title,
                    start,
                    end,
                    all_day,
                    location,
                    description,
                    publish,
                    repeat,
                    interval,
                    count,
                    until,
                },
            )
        }
        Commands::Export { calendar } => {
            let calendar = resolve_calendar(&app, &calendar)?;
            commands::export::run(&app, &calendar)
        }
    }
}

fn open_app(settings: Settings) -> Result<App> {
    let store = Store::open(&settings.store_path)?;
    tracing::debug!(path = %settings.store_path.display(), "opened store");
    let client = SubscriptionClient::new(HttpFetcher::new(), IcsParser::new());
    Ok(Refresher::new(Arc::new(store), client, settings))
}

fn resolve_calendar(app: &App, slug: &str) -> Result<Calendar> {
    let mut calendars = resolve_calendars(app, Some(slug))?;
    calendars
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Calendar '{}' not found", slug))
}

fn resolve_calendars(app: &App, calendar_filter: Option<&str>) -> Result<Vec<Calendar>> {
    let all_calendars = app.store().calendars();

    if all_calendars.is_empty() {
        anyhow::bail!(
            "No calendars found.\n\n\
            Add your first calendar with:\n  \
            eventcal add <name>\n\n\
            Or subscribe to a feed:\n  \
            eventcal add <name> --url https://example.com/events.ics"
        );
    }

    match calendar_filter {
        Some(slug) => {
            let available: Vec<_> = all_calendars.iter().map(|c| c.slug.clone()).collect();
            match all_calendars.into_iter().find(|c| c.slug == slug) {
                Some(cal) => Ok(vec![cal]),
                None => anyhow::bail!(
                    "Calendar '{}' not found. Available: {}",
                    slug,
                    available.join(", ")
                ),
            }
        }
        None => Ok(all_calendars),
    }
}
