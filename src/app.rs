//! Dashboard state.
//!
//! [`App`] is a reducer: [`App::handle`] folds one [`PollMsg`] into the
//! state and returns the [`Effect`]s the main loop should dispatch.  It never
//! performs I/O itself apart from synchronous cache peeks, which keeps every
//! transition testable without a runtime.

use chrono::{DateTime, Utc};

use crate::cache::CacheStore;
use crate::config::{AppConfig, ClockFormat};
use crate::connectivity::ConnectivityState;
use crate::input;
use crate::pipeline::{FetchState, Loadable, Status};
use crate::places::{City, Location};
use crate::poll::{Effect, PollMsg, Refresh, SourceKey, Sources};
use crate::rotation::{Group, RotationState};
use crate::source::{NewsItem, WeatherPayload};

/// One weather card and the bookkeeping behind it.
#[derive(Debug, Clone)]
pub struct WeatherSlot {
    pub key: SourceKey,
    pub label: String,
    /// IANA zone of the slot's clock.
    pub timezone: String,
    /// `None` until coordinates are known; the slot is never fetched then.
    pub location: Option<Location>,
    pub card: Loadable<WeatherPayload>,
    fetch: FetchState,
    /// A live outcome arrived for the current location this session.
    revalidated: bool,
    /// The query changed while a fetch was in flight.
    requery: bool,
}

impl WeatherSlot {
    fn city(city: &City) -> Self {
        Self {
            key: SourceKey::City(city.id.clone()),
            label: city.name.clone(),
            timezone: city.timezone.clone(),
            location: Some(city.location()),
            card: Loadable::loading(),
            fetch: FetchState::default(),
            revalidated: false,
            requery: false,
        }
    }

    fn local(timezone: String, fallback: Option<Location>) -> Self {
        Self {
            key: SourceKey::Local,
            label: fallback
                .as_ref()
                .map_or_else(|| "Local".to_string(), |l| l.name.clone()),
            timezone,
            location: fallback,
            card: Loadable::loading(),
            fetch: FetchState::default(),
            revalidated: false,
            requery: false,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_fetching()
    }
}

pub struct App {
    pub local: WeatherSlot,
    pub cities: Vec<WeatherSlot>,
    pub news: Loadable<Vec<NewsItem>>,
    news_fetch: FetchState,
    pub weather_rotation: RotationState,
    pub headline_rotation: RotationState,
    pub connectivity: ConnectivityState,
    pub clock_format: ClockFormat,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last notable event, shown in the status bar.
    pub status: String,
    cache: CacheStore,
    sources: Sources,
    /// IP geolocation has not answered yet.
    geo_pending: bool,
}

impl App {
    pub fn new(
        config: &AppConfig,
        cache: CacheStore,
        sources: Sources,
        timezone: String,
        fallback: Option<Location>,
    ) -> Self {
        let local = WeatherSlot::local(timezone, fallback);
        let cities: Vec<_> = config.cities.iter().map(WeatherSlot::city).collect();
        let group_len = cities.len() + usize::from(local.location.is_some());

        Self {
            local,
            cities,
            news: Loadable::loading(),
            news_fetch: FetchState::default(),
            weather_rotation: RotationState::new(Group::Weather, group_len),
            headline_rotation: RotationState::new(Group::Headlines, 0),
            connectivity: ConnectivityState::default(),
            clock_format: config.clock_format,
            quit: false,
            status: "Starting…".into(),
            cache,
            sources,
            geo_pending: true,
        }
    }

    /// Initial effects: the IP upgrade, first activations and both rotations.
    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = vec![Effect::ResolveLocation];

        effects.extend(self.activate_weather(&SourceKey::Local, now, false));
        if let Some(key) = self.active_city_key() {
            effects.extend(self.activate_weather(&key, now, false));
        }
        effects.extend(self.activate_news(now, false));

        for group in [Group::Weather, Group::Headlines] {
            push_unique(&mut effects, Effect::RestartRotation(group));
        }
        effects
    }

    pub fn handle(&mut self, msg: PollMsg, now: DateTime<Utc>) -> Vec<Effect> {
        match msg {
            PollMsg::Weather { key, outcome } => self.on_weather(key, outcome, now),
            PollMsg::News(outcome) => {
                self.news_fetch.finish();
                let count = outcome.value.as_ref().map_or(0, Vec::len);
                self.status = match outcome.status {
                    Status::Live => format!("Headlines updated ({count})"),
                    status => format!("Headlines {status}"),
                };
                self.apply_news(outcome)
            }
            PollMsg::LocationResolved(location) => self.on_location(location, now),
            PollMsg::Advance(Group::Weather) => {
                self.weather_rotation.advance();
                match self.active_weather_key() {
                    Some(key) => self.activate_weather(&key, now, false),
                    None => Vec::new(),
                }
            }
            PollMsg::Advance(Group::Headlines) => {
                self.headline_rotation.advance();
                Vec::new()
            }
            PollMsg::Countdown(Group::Weather) => {
                self.weather_rotation.tick();
                Vec::new()
            }
            PollMsg::Countdown(Group::Headlines) => {
                self.headline_rotation.tick();
                Vec::new()
            }
            PollMsg::Connectivity(online) => {
                if self.connectivity.apply(online) {
                    self.status = if online {
                        "Back online".into()
                    } else {
                        "Offline".into()
                    };
                }
                Vec::new()
            }
            PollMsg::RefreshDue(Refresh::Local) => {
                self.activate_weather(&SourceKey::Local, now, true)
            }
            PollMsg::RefreshDue(Refresh::News) => self.activate_news(now, true),
            PollMsg::Key(key) => input::handle_key_event(self, key, now),
        }
    }

    /// Refresh local weather, the active card and headlines regardless of
    /// freshness.  In-flight sources are left alone.
    pub fn force_refresh(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let mut effects = self.activate_weather(&SourceKey::Local, now, true);
        if let Some(key) = self.active_city_key() {
            effects.extend(self.activate_weather(&key, now, true));
        }
        effects.extend(self.activate_news(now, true));
        self.status = "Refreshing…".into();
        effects
    }

    // -- views ---------------------------------------------------------------

    /// `[local (if resolvable)] + cities`, in rotation order.
    pub fn weather_group(&self) -> Vec<&WeatherSlot> {
        let local = self.local.location.is_some().then_some(&self.local);
        local.into_iter().chain(&self.cities).collect()
    }

    pub fn active_weather(&self) -> Option<&WeatherSlot> {
        let index = self.weather_rotation.active()?;
        self.weather_group().get(index).copied()
    }

    pub fn headlines(&self) -> &[NewsItem] {
        self.news.value.as_deref().unwrap_or_default()
    }

    pub fn active_headline(&self) -> Option<&NewsItem> {
        self.headlines().get(self.headline_rotation.active()?)
    }

    // -- transitions ---------------------------------------------------------

    fn active_weather_key(&self) -> Option<SourceKey> {
        self.active_weather().map(|slot| slot.key.clone())
    }

    /// The active rotating card, unless it is the local slot.
    fn active_city_key(&self) -> Option<SourceKey> {
        let key = self.active_weather_key()?;
        (key != SourceKey::Local).then_some(key)
    }

    fn slot_mut(&mut self, key: &SourceKey) -> Option<&mut WeatherSlot> {
        match key {
            SourceKey::Local => Some(&mut self.local),
            SourceKey::City(_) => self.cities.iter_mut().find(|slot| slot.key == *key),
        }
    }

    /// Show what the cache holds and start a fetch if one is due.
    ///
    /// A fresh record is revalidated once per session; after that only a
    /// stale record or `force` triggers the network.
    fn activate_weather(
        &mut self,
        key: &SourceKey,
        now: DateTime<Utc>,
        force: bool,
    ) -> Vec<Effect> {
        let Some(source) = self.sources.weather(key).cloned() else {
            return Vec::new();
        };
        let geo_pending = self.geo_pending;
        let cache = self.cache.clone();
        let Some(slot) = self.slot_mut(key) else {
            return Vec::new();
        };

        let Some(location) = slot.location.clone() else {
            let status = if geo_pending {
                Status::Loading
            } else {
                Status::NeedsCity
            };
            slot.card = Loadable {
                value: None,
                status,
            };
            return Vec::new();
        };

        let peek = source.peek(&cache, now);
        if slot.card.value.is_none() {
            match &peek {
                Some(peek) => slot.card = Loadable::cached(peek.payload.clone()),
                None => slot.card.status = Status::Loading,
            }
        }

        let due = force || source.wants_fetch(peek.as_ref(), slot.revalidated);
        if due && slot.fetch.try_begin() {
            return vec![Effect::FetchWeather {
                key: key.clone(),
                location,
            }];
        }
        Vec::new()
    }

    fn activate_news(&mut self, now: DateTime<Utc>, force: bool) -> Vec<Effect> {
        let source = self.sources.news().clone();
        let peek = source.peek(&self.cache, now);

        let mut effects = Vec::new();
        if self.news.value.is_none() {
            match &peek {
                Some(peek) => {
                    let cached = Loadable::cached(peek.payload.clone());
                    effects.extend(self.apply_news(cached));
                }
                None => self.news.status = Status::Loading,
            }
        }

        let due = force || source.wants_fetch(peek.as_ref(), false);
        if due && self.news_fetch.try_begin() {
            effects.push(Effect::FetchNews);
        }
        effects
    }

    /// Merge a headline outcome; a changed id set restarts the rotation.
    fn apply_news(&mut self, outcome: Loadable<Vec<NewsItem>>) -> Vec<Effect> {
        let before = ids(self.headlines());
        self.news.merge(outcome);
        let after = ids(self.headlines());

        if before == after {
            return Vec::new();
        }
        self.headline_rotation.reset(after.len());
        vec![Effect::RestartRotation(Group::Headlines)]
    }

    fn on_weather(
        &mut self,
        key: SourceKey,
        outcome: Loadable<WeatherPayload>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(slot) = self.slot_mut(&key) else {
            tracing::warn!(key = key.id(), "weather outcome for unknown slot");
            return Vec::new();
        };
        slot.fetch.finish();
        let requery = std::mem::take(&mut slot.requery);
        if outcome.status == Status::Live && !requery {
            slot.revalidated = true;
        }
        slot.card.merge(outcome);
        let status = format!("{} weather {}", slot.label, slot.card.status);
        self.status = status;

        if requery {
            return self.activate_weather(&key, now, true);
        }
        Vec::new()
    }

    fn on_location(&mut self, location: Option<Location>, now: DateTime<Utc>) -> Vec<Effect> {
        self.geo_pending = false;

        let Some(location) = location else {
            if self.local.location.is_none() {
                tracing::info!("local city unresolved");
                self.local.card = Loadable {
                    value: None,
                    status: Status::NeedsCity,
                };
            }
            return Vec::new();
        };
        if self.local.location.as_ref() == Some(&location) {
            return Vec::new();
        }

        tracing::info!(city = %location.name, "local city resolved");
        let joined = self.local.location.is_none();
        self.local.label = location.name.clone();
        self.local.location = Some(location);
        self.local.revalidated = false;
        if self.local.is_fetching() {
            self.local.requery = true;
        }

        let mut effects = self.activate_weather(&SourceKey::Local, now, true);
        if joined {
            self.weather_rotation.reset(self.weather_group().len());
            effects.push(Effect::RestartRotation(Group::Weather));
        }
        effects
    }
}

fn ids(items: &[NewsItem]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

fn push_unique(effects: &mut Vec<Effect>, effect: Effect) {
    if !effects.contains(&effect) {
        effects.push(effect);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
