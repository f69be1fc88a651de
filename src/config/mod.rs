//! Dashboard configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (`AMBIENT_DASH_*`, nested with `__`)
//! 2. TOML config file (first CLI argument, or `AMBIENT_DASH_CONFIG_FILE`)
//! 3. Built-in defaults
//!
//! Freshness TTLs and rotation intervals are not configurable; they are
//! constants in [`crate::freshness`] and [`crate::rotation`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::places::{default_cities, City};

mod validation;

pub use validation::ConfigError;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one JSON record per tracked source.
    ///
    /// Set via AMBIENT_DASH_CACHE_DIR.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Log file; defaults to `ambient-dash.log` inside `cache_dir`.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// IANA zone override for the local clock and local-city guess.
    ///
    /// Set via AMBIENT_DASH_TIMEZONE.  Detected from the host when unset.
    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub clock_format: ClockFormat,

    /// World-clock and rotating-weather cities, in rotation order.
    #[serde(default = "default_cities")]
    pub cities: Vec<City>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockFormat {
    #[default]
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "12h")]
    H12,
}

impl ClockFormat {
    /// `strftime` pattern for the clock face.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::H24 => "%H:%M",
            Self::H12 => "%I:%M %p",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Set via AMBIENT_DASH_HTTP__USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for weather and headline services.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Shorter timeout for the IP geolocation upgrade.
    #[serde(default = "default_geo_timeout_ms")]
    pub geo_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            geo_timeout_ms: default_geo_timeout_ms(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}

/// Upstream service locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base URL; `/forecast` is appended.
    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    #[serde(default = "default_geo_url")]
    pub geo_url: String,

    /// Headline service A.
    #[serde(default = "default_hn_url")]
    pub hn_url: String,

    /// Headline service B.
    #[serde(default = "default_gdelt_url")]
    pub gdelt_url: String,

    /// Optional RSS feed tried after both headline services.
    #[serde(default)]
    pub rss_url: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather_url: default_weather_url(),
            geo_url: default_geo_url(),
            hn_url: default_hn_url(),
            gdelt_url: default_gdelt_url(),
            rss_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// `host:port` the probe opens a TCP connection to.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_addr: default_probe_addr(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// A non-empty path from the environment.
fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
}

fn default_cache_dir() -> PathBuf {
    if let Some(dir) = env_path("XDG_CACHE_HOME") {
        return dir.join("ambient-dash");
    }
    match env_path("HOME") {
        Some(home) => home.join(".cache").join("ambient-dash"),
        None => PathBuf::from(".ambient-dash-cache"),
    }
}

fn default_user_agent() -> String {
    concat!("ambient-dash/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_geo_timeout_ms() -> u64 {
    4_000
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com/v1".into()
}

fn default_geo_url() -> String {
    "https://ipapi.co/json/".into()
}

fn default_hn_url() -> String {
    "https://hn.algolia.com/api/v1/search?tags=front_page".into()
}

fn default_gdelt_url() -> String {
    let query = "query=sourcelang:english&mode=artlist&format=json&maxrecords=10&sort=datedesc";
    format!("https://api.gdeltproject.org/api/v2/doc/doc?{query}")
}

fn default_probe_addr() -> String {
    "1.1.1.1:443".into()
}

fn default_probe_interval_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_file: None,
            timezone: None,
            clock_format: ClockFormat::default(),
            cities: default_cities(),
            http: HttpConfig::default(),
            endpoints: Endpoints::default(),
            connectivity: ConnectivityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// `file` (usually the first CLI argument) takes priority over
    /// `AMBIENT_DASH_CONFIG_FILE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| env_path("AMBIENT_DASH_CONFIG_FILE"));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("AMBIENT_DASH_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The zone used for the local clock and the local-city guess.
    pub fn local_timezone(&self) -> String {
        self.timezone
            .clone()
            .or_else(|| iana_time_zone::get_timezone().ok())
            .unwrap_or_else(|| "UTC".into())
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("ambient-dash.log"))
    }
}
