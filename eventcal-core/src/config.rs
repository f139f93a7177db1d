//! Global eventcal configuration.
//!
//! Settings are layered: built-in defaults, then the optional file at
//! `~/.config/eventcal/config.toml`, then `EVENTCAL_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{EventCalError, EventCalResult};

static DEFAULT_STORE_PATH: &str = "~/.local/share/eventcal/store.json";
static DEFAULT_REFRESH_INTERVAL: &str = "1h";
static DEFAULT_RECURRENCE_HORIZON: &str = "2years";
static DEFAULT_FETCH_TIMEOUT: &str = "30s";
static DEFAULT_LOG_LEVEL: &str = "info";

/// Values as written in the config file, before durations are parsed.
#[derive(Debug, Deserialize)]
struct RawSettings {
    store_path: String,
    refresh_interval: String,
    recurrence_horizon: String,
    fetch_timeout: String,
    log_level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Store file, with `~` already expanded.
    pub store_path: PathBuf,
    /// Staleness window for subscriptions that don't set their own.
    pub refresh_interval: Duration,
    /// How far past "now" unbounded rules are expanded.
    pub recurrence_horizon: Duration,
    pub fetch_timeout: Duration,
    /// An `EnvFilter` directive.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store_path: expand_path(DEFAULT_STORE_PATH),
            refresh_interval: Duration::from_secs(60 * 60),
            recurrence_horizon: Duration::from_secs(2 * 31_557_600),
            fetch_timeout: Duration::from_secs(30),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> EventCalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EventCalError::Config("Could not determine config directory".into()))?
            .join("eventcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from the default config location, creating a commented
    /// out config file there on first use.
    pub fn load() -> EventCalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(Some(&config_path))
    }

    /// Load settings from `path` (if any) layered over the defaults, with
    /// `EVENTCAL_*` environment variables taking precedence.
    pub fn load_from(path: Option<&Path>) -> EventCalResult<Self> {
        let mut builder = Config::builder()
            .set_default("store_path", DEFAULT_STORE_PATH)
            .and_then(|b| b.set_default("refresh_interval", DEFAULT_REFRESH_INTERVAL))
            .and_then(|b| b.set_default("recurrence_horizon", DEFAULT_RECURRENCE_HORIZON))
            .and_then(|b| b.set_default("fetch_timeout", DEFAULT_FETCH_TIMEOUT))
            .and_then(|b| b.set_default("log_level", DEFAULT_LOG_LEVEL))
            .map_err(|e| EventCalError::Config(e.to_string()))?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let raw: RawSettings = builder
            .add_source(Environment::with_prefix("EVENTCAL").ignore_empty(true))
            .build()
            .map_err(|e| EventCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EventCalError::Config(e.to_string()))?;

        Ok(Settings {
            store_path: expand_path(&raw.store_path),
            refresh_interval: parse_duration("refresh_interval", &raw.refresh_interval)?,
            recurrence_horizon: parse_duration("recurrence_horizon", &raw.recurrence_horizon)?,
            fetch_timeout: parse_duration("fetch_timeout", &raw.fetch_timeout)?,
            log_level: raw.log_level,
        })
    }

    /// The horizon unbounded rules are expanded up to, seen from `now`.
    pub fn horizon_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.recurrence_horizon)
            .ok()
            .and_then(|offset| now.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> EventCalResult<()> {
        let contents = format!(
            "\
# eventcal configuration

# Where calendars and events are stored:
# store_path = \"{DEFAULT_STORE_PATH}\"

# How long a subscription stays fresh when it doesn't set its own interval:
# refresh_interval = \"{DEFAULT_REFRESH_INTERVAL}\"

# How far ahead indefinitely repeating events are expanded:
# recurrence_horizon = \"{DEFAULT_RECURRENCE_HORIZON}\"

# Give up on a feed download after:
# fetch_timeout = \"{DEFAULT_FETCH_TIMEOUT}\"

# Log filter (overridden by RUST_LOG):
# log_level = \"{DEFAULT_LOG_LEVEL}\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EventCalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| EventCalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn parse_duration(key: &str, value: &str) -> EventCalResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| EventCalError::Config(format!("{key}: '{value}' is not a duration ({e})")))
}
