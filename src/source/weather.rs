//! Weather payload and the Open-Meteo forecast retriever.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{get_json, FetchError, Retriever};
use crate::cache::Cacheable;
use crate::pipeline::Payload;
use crate::places::Location;

/// Current conditions plus today's high/low for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPayload {
    pub city: String,
    pub updated_at: DateTime<Utc>,
    pub temperature: f64,
    /// WMO weather interpretation code.
    pub weathercode: i32,
    pub hi: Option<f64>,
    pub lo: Option<f64>,
}

impl WeatherPayload {
    pub fn category(&self) -> WeatherCategory {
        WeatherCategory::from_code(self.weathercode)
    }
}

impl Cacheable for WeatherPayload {
    const FIELD: &'static str = "data";
}

impl Payload for WeatherPayload {}

/// Coarse grouping of WMO codes used by the cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCategory {
    Clear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    Rain,
    Showers,
    Snow,
    Thunderstorm,
    Unknown,
}

impl WeatherCategory {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 | 2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51..=57 => Self::Drizzle,
            61..=67 => Self::Rain,
            71..=77 | 85 | 86 => Self::Snow,
            80..=82 => Self::Showers,
            95..=99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Showers => "Showers",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Open-Meteo
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
    #[serde(default)]
    daily: Option<Daily>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    weathercode: i32,
}

#[derive(Debug, Deserialize)]
struct Daily {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

/// Forecast retriever for the Open-Meteo API (or anything speaking it).
pub struct OpenMeteo {
    client: Client,
    base_url: String,
}

impl OpenMeteo {
    /// `base_url` is everything before `/forecast`, e.g.
    /// `https://api.open-meteo.com/v1`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn into_payload(
        body: ForecastResponse,
        location: &Location,
        now: DateTime<Utc>,
    ) -> WeatherPayload {
        let first = |values: &[Option<f64>]| values.first().copied().flatten();
        let (hi, lo) = match body.daily {
            Some(daily) => (
                first(&daily.temperature_2m_max),
                first(&daily.temperature_2m_min),
            ),
            None => (None, None),
        };

        WeatherPayload {
            city: location.name.clone(),
            updated_at: now,
            temperature: body.current_weather.temperature,
            weathercode: body.current_weather.weathercode,
            hi,
            lo,
        }
    }
}

#[async_trait]
impl Retriever<Location, WeatherPayload> for OpenMeteo {
    fn name(&self) -> &str {
        "open-meteo"
    }

    async fn retrieve(&self, location: &Location) -> Result<WeatherPayload, FetchError> {
        let url = format!("{}/forecast", self.base_url.trim_end_matches('/'));
        let request = self.client.get(url).query(&[
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
            ("timezone", location.timezone.clone()),
        ]);

        let body: ForecastResponse = get_json(request).await?;
        Ok(Self::into_payload(body, location, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing;

    fn paris() -> Location {
        Location {
            name: "Paris".into(),
            latitude: 48.8566,
            longitude: 2.3522,
            timezone: "Europe/Paris".into(),
        }
    }

    const FORECAST: &str = r#"{
        "latitude": 48.86,
        "longitude": 2.35,
        "current_weather": {"temperature": 17.4, "windspeed": 9.1, "weathercode": 61},
        "daily": {
            "time": ["2025-06-01"],
            "temperature_2m_max": [21.0],
            "temperature_2m_min": [11.5]
        }
    }"#;

    #[test]
    fn classifies_known_codes() {
        let cases = [
            (0, WeatherCategory::Clear),
            (2, WeatherCategory::PartlyCloudy),
            (48, WeatherCategory::Fog),
            (55, WeatherCategory::Drizzle),
            (65, WeatherCategory::Rain),
            (81, WeatherCategory::Showers),
            (86, WeatherCategory::Snow),
            (99, WeatherCategory::Thunderstorm),
        ];
        for (code, expected) in cases {
            assert_eq!(WeatherCategory::from_code(code), expected, "code {code}");
        }
    }

    #[test]
    fn unknown_codes_map_to_default_category() {
        assert_eq!(WeatherCategory::from_code(4), WeatherCategory::Unknown);
        assert_eq!(WeatherCategory::from_code(-1), WeatherCategory::Unknown);
        assert_eq!(WeatherCategory::from_code(1000).label(), "Unknown");
    }

    #[test]
    fn maps_forecast_into_payload() {
        let body: ForecastResponse = serde_json::from_str(FORECAST).unwrap();
        let now = Utc::now();
        let payload = OpenMeteo::into_payload(body, &paris(), now);

        assert_eq!(payload.city, "Paris");
        assert_eq!(payload.updated_at, now);
        assert_eq!(payload.temperature, 17.4);
        assert_eq!(payload.weathercode, 61);
        assert_eq!(payload.hi, Some(21.0));
        assert_eq!(payload.lo, Some(11.5));
        assert_eq!(payload.category(), WeatherCategory::Rain);
    }

    #[test]
    fn missing_daily_block_leaves_hi_lo_empty() {
        let json = r#"{"current_weather":{"temperature":3.0,"weathercode":0}}"#;
        let body: ForecastResponse = serde_json::from_str(json).unwrap();
        let payload = OpenMeteo::into_payload(body, &paris(), Utc::now());

        assert_eq!(payload.hi, None);
        assert_eq!(payload.lo, None);
    }

    #[test]
    fn missing_current_weather_is_malformed() {
        let result = serde_json::from_str::<ForecastResponse>(r#"{"daily":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn payload_serializes_camel_case() {
        let body: ForecastResponse = serde_json::from_str(FORECAST).unwrap();
        let payload = OpenMeteo::into_payload(body, &paris(), Utc::now());
        let value = serde_json::to_value(payload).unwrap();
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("weathercode").is_some());
    }

    #[tokio::test]
    async fn retrieves_over_http() {
        let base = testing::serve(200, FORECAST).await;
        let retriever = OpenMeteo::new(Client::new(), base);

        let payload = retriever.retrieve(&paris()).await.unwrap();
        assert_eq!(payload.weathercode, 61);
        assert_eq!(retriever.name(), "open-meteo");
    }

    #[tokio::test]
    async fn upstream_error_status_fails() {
        let base = testing::serve(500, "{}").await;
        let retriever = OpenMeteo::new(Client::new(), base);

        let result = retriever.retrieve(&paris()).await;
        assert!(matches!(result, Err(FetchError::Status(500))));
    }
}
