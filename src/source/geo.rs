//! Local city resolution.
//!
//! Two stages: the offline timezone table in [`crate::places`] gives an
//! immediate guess, then an IP lookup may upgrade it.  A failed upgrade is
//! never surfaced; the guess (possibly none) stands.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{get_json, FetchError, Retriever};
use crate::places::Location;

/// What an IP geolocation service reports.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// `GET <url>` → `{city, latitude, longitude}` (ipapi.co shape).
pub struct IpApi {
    client: Client,
    url: String,
    timeout: Duration,
}

impl IpApi {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Retriever<(), GeoFix> for IpApi {
    fn name(&self) -> &str {
        "ip-geolocation"
    }

    async fn retrieve(&self, _: &()) -> Result<GeoFix, FetchError> {
        let request = self.client.get(&self.url).timeout(self.timeout);
        let body: IpApiResponse = get_json(request).await?;
        let city = body.city.filter(|c| !c.is_empty());
        Ok(GeoFix {
            city: city.ok_or(FetchError::Incomplete("city"))?,
            latitude: body.latitude.ok_or(FetchError::Incomplete("latitude"))?,
            longitude: body.longitude.ok_or(FetchError::Incomplete("longitude"))?,
        })
    }
}

/// Try to upgrade `fallback` with an IP lookup.
///
/// The upgraded location keeps `timezone`, the host's zone.
pub async fn resolve_local(
    fallback: Option<Location>,
    locator: &dyn Retriever<(), GeoFix>,
    timezone: &str,
) -> Option<Location> {
    match locator.retrieve(&()).await {
        Ok(fix) => {
            tracing::info!(city = %fix.city, "local city resolved by IP");
            Some(Location {
                name: fix.city,
                latitude: fix.latitude,
                longitude: fix.longitude,
                timezone: timezone.to_string(),
            })
        }
        Err(e) => {
            tracing::debug!(
                error = %e,
                fallback = ?fallback.as_ref().map(|l| &l.name),
                "IP geolocation failed"
            );
            fallback
        }
    }
}
