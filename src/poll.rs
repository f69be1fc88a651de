//! Background work: fetches, geolocation and periodic refresh triggers.
//!
//! The dashboard state never performs I/O itself.  It returns [`Effect`]s,
//! and the [`Poller`] turns each into a spawned task whose result comes back
//! to the main loop as a [`PollMsg`] over an unbounded [`mpsc`] channel.
//!
//! Every task is tied to the poller's shutdown [`CancellationToken`], so
//! tearing the dashboard down abandons in-flight requests instead of leaking
//! them.
//!
//! [`mpsc`]: tokio::sync::mpsc

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEvent;
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::cache::{weather_cache_key, CacheStore, NEWS_CACHE_KEY};
use crate::config::AppConfig;
use crate::freshness::{NEWS_TTL, WEATHER_TTL};
use crate::pipeline::{Loadable, Revalidate, Source};
use crate::places::Location;
use crate::rotation::{Group, Scheduler};
use crate::source::{
    geo, GdeltHeadlines, GeoFix, HackerNewsHeadlines, IpApi, NewsItem, OpenMeteo, Retriever,
    RssHeadlines, WeatherPayload,
};

pub type WeatherSource = Source<Location, WeatherPayload>;
pub type NewsSource = Source<(), Vec<NewsItem>>;

/// Identifies a weather source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Local,
    City(String),
}

impl SourceKey {
    pub fn id(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::City(id) => id,
        }
    }
}

/// Sources with a periodic, TTL-paced refresh trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Local,
    News,
}

/// Messages delivered to the main loop.
#[derive(Debug, Clone)]
pub enum PollMsg {
    Weather {
        key: SourceKey,
        outcome: Loadable<WeatherPayload>,
    },
    News(Loadable<Vec<NewsItem>>),
    /// Result of the IP upgrade (or the timezone fallback when it failed).
    LocationResolved(Option<Location>),
    Advance(Group),
    Countdown(Group),
    Connectivity(bool),
    RefreshDue(Refresh),
    Key(KeyEvent),
}

/// Side effects requested by the dashboard state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchWeather { key: SourceKey, location: Location },
    FetchNews,
    ResolveLocation,
    RestartRotation(Group),
}

// ---------------------------------------------------------------------------
// Source catalog
// ---------------------------------------------------------------------------

/// Every source and its retriever chain, configured once at startup.
#[derive(Clone)]
pub struct Sources {
    weather: HashMap<SourceKey, Arc<WeatherSource>>,
    news: Arc<NewsSource>,
}

impl Sources {
    pub fn new(
        weather_chain: Vec<Arc<dyn Retriever<Location, WeatherPayload>>>,
        news_chain: Vec<Arc<dyn Retriever<(), Vec<NewsItem>>>>,
        city_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let weather = std::iter::once(SourceKey::Local)
            .chain(city_ids.into_iter().map(SourceKey::City))
            .map(|key| {
                let source = Source::new(
                    key.id(),
                    weather_cache_key(key.id()),
                    WEATHER_TTL,
                    Revalidate::Once,
                    weather_chain.clone(),
                );
                (key, Arc::new(source))
            })
            .collect();

        let news = Arc::new(Source::new(
            "news",
            NEWS_CACHE_KEY,
            NEWS_TTL,
            Revalidate::WhenStale,
            news_chain,
        ));

        Self { weather, news }
    }

    /// Build the production chains from configuration.
    ///
    /// Headlines are tried in order: Hacker News, GDELT, then the RSS feed
    /// when one is configured.  Runs after logging is up, so an empty
    /// `rss_url` is reported here.
    pub fn from_config(config: &AppConfig, client: &Client) -> Self {
        let endpoints = &config.endpoints;

        let open_meteo = OpenMeteo::new(client.clone(), &endpoints.weather_url);
        let weather_chain: Vec<Arc<dyn Retriever<Location, WeatherPayload>>> =
            vec![Arc::new(open_meteo)];

        let mut news_chain: Vec<Arc<dyn Retriever<(), Vec<NewsItem>>>> = vec![
            Arc::new(HackerNewsHeadlines::new(client.clone(), &endpoints.hn_url)),
            Arc::new(GdeltHeadlines::new(client.clone(), &endpoints.gdelt_url)),
        ];
        match endpoints.rss_url.as_deref() {
            Some("") => tracing::warn!("endpoints.rss_url is empty; RSS fallback disabled"),
            Some(url) => {
                let rss = RssHeadlines::new(client.clone(), url, "RSS");
                news_chain.push(Arc::new(rss));
            }
            None => {}
        }

        let ids = config.cities.iter().map(|c| c.id.clone());
        let sources = Self::new(weather_chain, news_chain, ids);
        tracing::debug!(headlines = ?sources.news.chain_names(), "sources configured");
        sources
    }

    pub fn weather(&self, key: &SourceKey) -> Option<&Arc<WeatherSource>> {
        self.weather.get(key)
    }

    pub fn news(&self) -> &Arc<NewsSource> {
        &self.news
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Executes [`Effect`]s as background tasks.
pub struct Poller {
    tx: UnboundedSender<PollMsg>,
    cache: CacheStore,
    sources: Sources,
    locator: Arc<dyn Retriever<(), GeoFix>>,
    /// Offline timezone guess, kept when the IP upgrade fails.
    fallback: Option<Location>,
    timezone: String,
    scheduler: Scheduler,
    shutdown: CancellationToken,
}

impl Poller {
    pub fn new(
        tx: UnboundedSender<PollMsg>,
        cache: CacheStore,
        sources: Sources,
        locator: Arc<dyn Retriever<(), GeoFix>>,
        fallback: Option<Location>,
        timezone: impl Into<String>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            scheduler: Scheduler::new(tx.clone(), shutdown.clone()),
            tx,
            cache,
            sources,
            locator,
            fallback,
            timezone: timezone.into(),
            shutdown,
        }
    }

    /// Build the production geolocation retriever.
    pub fn ip_locator(config: &AppConfig, client: &Client) -> Arc<dyn Retriever<(), GeoFix>> {
        let endpoint = &config.endpoints.geo_url;
        let timeout = config.http.geo_timeout();
        Arc::new(IpApi::new(client.clone(), endpoint, timeout))
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn dispatch(&mut self, effect: Effect) {
        tracing::debug!(?effect, "dispatch");
        match effect {
            Effect::FetchWeather { key, location } => {
                let Some(source) = self.sources.weather(&key).cloned() else {
                    tracing::warn!(key = key.id(), "no weather source configured");
                    return;
                };
                let cache = self.cache.clone();
                self.spawn(async move {
                    let outcome = source.refresh(&location, &cache).await;
                    PollMsg::Weather { key, outcome }
                });
            }
            Effect::FetchNews => {
                let source = self.sources.news().clone();
                let cache = self.cache.clone();
                self.spawn(async move {
                    let outcome = source.refresh(&(), &cache).await;
                    PollMsg::News(outcome)
                });
            }
            Effect::ResolveLocation => {
                let locator = self.locator.clone();
                let fallback = self.fallback.clone();
                let timezone = self.timezone.clone();
                self.spawn(async move {
                    let location = geo::resolve_local(fallback, &*locator, &timezone).await;
                    PollMsg::LocationResolved(location)
                });
            }
            Effect::RestartRotation(group) => self.scheduler.restart(group),
        }
    }

    /// Re-trigger local weather and news once per TTL.
    pub fn spawn_refresh_timers(&self) {
        self.spawn_timer(WEATHER_TTL, Refresh::Local);
        self.spawn_timer(NEWS_TTL, Refresh::News);
    }

    fn spawn_timer(&self, period: Duration, which: Refresh) {
        let tx = self.tx.clone();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {
                        if tx.send(PollMsg::RefreshDue(which)).is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }

    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = PollMsg> + Send + 'static,
    {
        let tx = self.tx.clone();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                msg = work => {
                    // The receiver is gone only once the main loop has exited.
                    let _ = tx.send(msg);
                }
            }
        });
    }

    /// Cancel every timer and in-flight task.
    pub fn shutdown(&mut self) {
        self.scheduler.stop_all();
        self.shutdown.cancel();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
