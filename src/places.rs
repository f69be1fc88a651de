//! Cities, coordinates and the offline timezone → city table.

use serde::{Deserialize, Serialize};

/// Resolved coordinates for a weather query.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone passed to the forecast API so daily highs/lows line up.
    pub timezone: String,
}

/// A world-clock/weather city from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Stable identifier; also names the city's cache record.
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    pub fn new(id: &str, name: &str, timezone: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            timezone: timezone.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone.clone(),
        }
    }
}

pub fn default_cities() -> Vec<City> {
    vec![
        City::new("london", "London", "Europe/London", 51.5072, -0.1276),
        City::new("new-york", "New York", "America/New_York", 40.7128, -74.006),
        City::new("tokyo", "Tokyo", "Asia/Tokyo", 35.6762, 139.6503),
        City::new("sydney", "Sydney", "Australia/Sydney", -33.8688, 151.2093),
    ]
}

/// `(zone, city, latitude, longitude)`
const TIMEZONE_CITIES: &[(&str, &str, f64, f64)] = &[
    ("Africa/Cairo", "Cairo", 30.0444, 31.2357),
    ("Africa/Johannesburg", "Johannesburg", -26.2041, 28.0473),
    ("Africa/Lagos", "Lagos", 6.5244, 3.3792),
    ("Africa/Nairobi", "Nairobi", -1.2921, 36.8219),
    ("America/Chicago", "Chicago", 41.8781, -87.6298),
    ("America/Denver", "Denver", 39.7392, -104.9903),
    ("America/Los_Angeles", "Los Angeles", 34.0522, -118.2437),
    ("America/Mexico_City", "Mexico City", 19.4326, -99.1332),
    ("America/New_York", "New York", 40.7128, -74.0060),
    ("America/Phoenix", "Phoenix", 33.4484, -112.0740),
    ("America/Sao_Paulo", "São Paulo", -23.5505, -46.6333),
    ("America/Toronto", "Toronto", 43.6532, -79.3832),
    ("America/Vancouver", "Vancouver", 49.2827, -123.1207),
    ("Asia/Dubai", "Dubai", 25.2048, 55.2708),
    ("Asia/Hong_Kong", "Hong Kong", 22.3193, 114.1694),
    ("Asia/Kolkata", "Kolkata", 22.5726, 88.3639),
    ("Asia/Seoul", "Seoul", 37.5665, 126.9780),
    ("Asia/Shanghai", "Shanghai", 31.2304, 121.4737),
    ("Asia/Singapore", "Singapore", 1.3521, 103.8198),
    ("Asia/Tokyo", "Tokyo", 35.6762, 139.6503),
    ("Australia/Melbourne", "Melbourne", -37.8136, 144.9631),
    ("Australia/Sydney", "Sydney", -33.8688, 151.2093),
    ("Europe/Amsterdam", "Amsterdam", 52.3676, 4.9041),
    ("Europe/Berlin", "Berlin", 52.5200, 13.4050),
    ("Europe/Dublin", "Dublin", 53.3498, -6.2603),
    ("Europe/Lisbon", "Lisbon", 38.7223, -9.1393),
    ("Europe/London", "London", 51.5072, -0.1276),
    ("Europe/Madrid", "Madrid", 40.4168, -3.7038),
    ("Europe/Paris", "Paris", 48.8566, 2.3522),
    ("Europe/Rome", "Rome", 41.9028, 12.4964),
    ("Europe/Stockholm", "Stockholm", 59.3293, 18.0686),
    ("Europe/Warsaw", "Warsaw", 52.2297, 21.0122),
    ("Pacific/Auckland", "Auckland", -36.8485, 174.7633),
    ("Pacific/Honolulu", "Honolulu", 21.3069, -157.8583),
];

/// Best offline guess at the local city, from the zone name alone.
pub fn city_for_timezone(timezone: &str) -> Option<Location> {
    TIMEZONE_CITIES
        .iter()
        .find(|(zone, ..)| *zone == timezone)
        .map(|&(zone, name, latitude, longitude)| Location {
            name: name.to_string(),
            latitude,
            longitude,
            timezone: zone.to_string(),
        })
}
