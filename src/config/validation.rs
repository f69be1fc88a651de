//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::AppConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

fn is_zone(name: &str) -> bool {
    name.parse::<chrono_tz::Tz>().is_ok()
}

/// City ids name cache files, so they stay filename-safe.
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `http.user_agent` is empty
    /// - a timeout is below 100ms or above 60s
    /// - `connectivity.probe_interval_secs` is 0
    /// - `timezone` is set but not an IANA zone
    /// - there are no cities, or a city has an empty/duplicate id, an id with
    ///   characters outside `[A-Za-z0-9_-]`, an unknown zone, or out-of-range
    ///   coordinates
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(invalid("http.user_agent", "must not be empty"));
        }

        let timeouts = [
            ("http.timeout_ms", self.http.timeout_ms),
            ("http.geo_timeout_ms", self.http.geo_timeout_ms),
        ];
        for (field, value) in timeouts {
            if value < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if value > 60_000 {
                return Err(invalid(field, "must not exceed 60000ms"));
            }
        }

        if self.connectivity.probe_interval_secs == 0 {
            let field = "connectivity.probe_interval_secs";
            return Err(invalid(field, "must be at least 1"));
        }

        if let Some(zone) = &self.timezone {
            if !is_zone(zone) {
                return Err(invalid("timezone", format!("unknown zone {zone:?}")));
            }
        }

        if self.cities.is_empty() {
            return Err(invalid("cities", "at least one city is required"));
        }

        let mut ids = HashSet::new();
        for city in &self.cities {
            if city.id.is_empty() {
                return Err(invalid("cities.id", "must not be empty"));
            }
            if !city.id.chars().all(is_id_char) {
                let reason = format!("{:?} may only use letters, digits, '-' and '_'", city.id);
                return Err(invalid("cities.id", reason));
            }
            if city.id == "local" {
                return Err(invalid("cities.id", "\"local\" is reserved"));
            }
            if !ids.insert(city.id.as_str()) {
                return Err(invalid("cities.id", format!("duplicate id {:?}", city.id)));
            }
            if !is_zone(&city.timezone) {
                let reason = format!("unknown zone {:?} for {}", city.timezone, city.id);
                return Err(invalid("cities.timezone", reason));
            }
            let out_of_range = format!("out of range for {}", city.id);
            if !(-90.0..=90.0).contains(&city.latitude) {
                return Err(invalid("cities.latitude", out_of_range));
            }
            if !(-180.0..=180.0).contains(&city.longitude) {
                return Err(invalid("cities.longitude", out_of_range));
            }
        }

        Ok(())
    }
}
