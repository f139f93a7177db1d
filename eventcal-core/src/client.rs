//! Fetching subscription feeds and keeping subscribed calendars fresh.
//!
//! Fetching is the only slow step of a refresh. It runs under a timeout and
//! outside the store lock; only the parsed document reaches [`reconcile`],
//! which commits all at once or not at all.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;

use crate::calendar::{Calendar, CalendarId, Credentials, Subscription};
use crate::config::Settings;
use crate::error::{EventCalError, EventCalResult};
use crate::feed::FeedDocument;
use crate::store::Store;
use crate::sync::{Summary, reconcile};

/// Downloads the raw bytes of a feed.
pub trait FeedFetcher {
    fn fetch(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> impl Future<Output = EventCalResult<Vec<u8>>> + Send;
}

/// Turns downloaded bytes into a [`FeedDocument`].
pub trait FeedParser {
    fn parse(&self, bytes: &[u8]) -> EventCalResult<FeedDocument>;
}

/// Fetches feeds over HTTP(S). `webcal://` URLs are fetched as `https://`.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher::default()
    }
}

impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> EventCalResult<Vec<u8>> {
        let url = http_url(url);

        let mut request = self.http.get(&url);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EventCalError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EventCalError::Fetch(format!("{url}: server answered {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EventCalError::Fetch(format!("{url}: {e}")))?;
        Ok(body.to_vec())
    }
}

fn http_url(url: &str) -> String {
    match url.strip_prefix("webcal://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Fetches a subscription's feed and parses it.
pub struct SubscriptionClient<F, P> {
    fetcher: F,
    parser: P,
}

impl<F: FeedFetcher, P: FeedParser> SubscriptionClient<F, P> {
    pub fn new(fetcher: F, parser: P) -> Self {
        SubscriptionClient { fetcher, parser }
    }

    /// Fetch and parse the feed behind `subscription`, giving up after `limit`.
    pub async fn load(
        &self,
        subscription: &Subscription,
        limit: Duration,
    ) -> EventCalResult<FeedDocument> {
        let fetch = self
            .fetcher
            .fetch(&subscription.url, subscription.credentials.as_ref());

        let bytes = timeout(limit, fetch)
            .await
            .map_err(|_| EventCalError::FetchTimeout(limit.as_secs()))??;

        tracing::debug!(url = %subscription.url, bytes = bytes.len(), "fetched feed");
        self.parser.parse(&bytes)
    }
}

/// Refreshes subscribed calendars against their feeds.
///
/// A calendar is never reconciled by two refreshes at once: each calendar
/// has its own async lock, held from fetch to commit.
pub struct Refresher<F, P> {
    store: Arc<Store>,
    client: SubscriptionClient<F, P>,
    settings: Settings,
    locks: Mutex<HashMap<CalendarId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<F: FeedFetcher, P: FeedParser> Refresher<F, P> {
    pub fn new(store: Arc<Store>, client: SubscriptionClient<F, P>, settings: Settings) -> Self {
        Refresher {
            store,
            client,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn lock_for(&self, calendar_id: CalendarId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(calendar_id).or_default().clone()
    }

    fn subscribed_calendar(&self, calendar_id: CalendarId) -> EventCalResult<(Calendar, Subscription)> {
        let calendar = self
            .store
            .calendar(calendar_id)
            .ok_or_else(|| EventCalError::CalendarNotFound(calendar_id.to_string()))?;
        let subscription = calendar
            .subscription
            .clone()
            .ok_or_else(|| EventCalError::NoSubscription(calendar.slug.clone()))?;
        Ok((calendar, subscription))
    }

    /// Fetch and reconcile `calendar_id` now, whether or not it is stale.
    pub async fn refresh(&self, calendar_id: CalendarId, now: DateTime<Utc>) -> EventCalResult<Summary> {
        let lock = self.lock_for(calendar_id);
        let _guard = lock.lock().await;

        self.refresh_locked(calendar_id, now).await
    }

    async fn refresh_locked(&self, calendar_id: CalendarId, now: DateTime<Utc>) -> EventCalResult<Summary> {
        let (calendar, subscription) = self.subscribed_calendar(calendar_id)?;
        tracing::info!(calendar = %calendar.slug, url = %subscription.url, "refreshing feed");

        let feed = match self.client.load(&subscription, self.settings.fetch_timeout).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::error!(calendar = %calendar.slug, error = %e, "could not load feed");
                return Err(e);
            }
        };

        let venues = self.store.venues();
        reconcile(
            &self.store,
            calendar_id,
            &feed,
            &venues,
            self.settings.horizon_from(now),
            now,
        )
    }

    /// Refresh `calendar_id` if its subscription refreshes automatically and
    /// has gone stale.
    ///
    /// Meant for read paths: failures to fetch, parse or reconcile the feed
    /// are logged and swallowed, since they leave stored data untouched.
    /// Anything else, such as the store failing to save, is returned. Gives
    /// the summary when a refresh actually ran.
    pub async fn refresh_if_stale(
        &self,
        calendar_id: CalendarId,
        now: DateTime<Utc>,
    ) -> EventCalResult<Option<Summary>> {
        match self.refresh_if_due(calendar_id, now).await {
            Err(e) if e.is_refresh_failure() => {
                tracing::warn!(calendar = %calendar_id, error = %e, "opportunistic refresh failed");
                Ok(None)
            }
            result => result,
        }
    }

    /// Like [`Refresher::refresh_if_stale`], but every failure is returned.
    pub async fn refresh_if_due(
        &self,
        calendar_id: CalendarId,
        now: DateTime<Utc>,
    ) -> EventCalResult<Option<Summary>> {
        if !self.is_due(calendar_id, now) {
            return Ok(None);
        }

        let lock = self.lock_for(calendar_id);
        let _guard = lock.lock().await;

        // another task may have refreshed while we waited
        if !self.is_due(calendar_id, now) {
            return Ok(None);
        }

        self.refresh_locked(calendar_id, now).await.map(Some)
    }

    fn is_due(&self, calendar_id: CalendarId, now: DateTime<Utc>) -> bool {
        let default_interval = self.settings.refresh_interval;
        self.store
            .calendar(calendar_id)
            .and_then(|calendar| calendar.subscription)
            .is_some_and(|subscription| {
                subscription.refresh_automatically(default_interval)
                    && subscription.needs_refreshment(now, default_interval)
            })
    }

    /// Refresh every stale, automatically refreshed subscription.
    pub async fn check_refreshments(&self, now: DateTime<Utc>) -> EventCalResult<Vec<(Calendar, Summary)>> {
        let mut refreshed = Vec::new();
        for calendar in self.store.calendars() {
            if let Some(summary) = self.refresh_if_stale(calendar.id, now).await? {
                refreshed.push((calendar, summary));
            }
        }
        Ok(refreshed)
    }

    /// Refresh every subscribed calendar, stale or not.
    pub async fn refresh_all(&self, now: DateTime<Utc>) -> Vec<(Calendar, EventCalResult<Summary>)> {
        let mut results = Vec::new();
        for calendar in self.store.calendars().into_iter().filter(Calendar::is_subscribed) {
            let result = self.refresh(calendar.id, now).await;
            results.push((calendar, result));
        }
        results
    }
}
