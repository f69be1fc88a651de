//! Upstream retrievers.
//!
//! This module defines the [`Retriever`] trait and the [`FetchError`] type.
//! Concrete retrievers live in sub-modules:
//!
//! * [`weather`]: Open-Meteo forecasts, plus the [`WeatherPayload`] shape.
//! * [`news`]: Hacker News (Algolia) and GDELT headlines, plus [`NewsItem`].
//! * [`rss`]: an optional RSS 2.0 headline fallback.
//! * [`geo`]: IP-based geolocation for the local city.
//!
//! ## For contributors: adding a new retriever
//!
//! 1. Create a new file in this directory (e.g. `metno.rs`).
//! 2. Define a struct holding its client and endpoint, and implement
//!    [`Retriever`] for it with the query/payload pair it serves.
//! 3. Add `pub mod metno;` below.
//! 4. Append it to the relevant chain in [`crate::poll::Sources::from_config`].
//!
//! Ordering in the chain is the fallback order.  The pipeline, caching and
//! UI are all retriever-agnostic.

pub mod geo;
pub mod news;
pub mod rss;
pub mod weather;

pub use geo::{GeoFix, IpApi};
pub use news::{GdeltHeadlines, HackerNewsHeadlines, NewsItem};
pub use self::rss::RssHeadlines;
pub use weather::{OpenMeteo, WeatherPayload};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::HttpConfig;

/// Why a single retriever could not produce a payload.
///
/// These never reach the UI: the pipeline logs them and moves on to the next
/// retriever in the chain.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("malformed body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed feed: {0}")]
    Feed(#[from] ::rss::Error),

    #[error("response was missing {0}")]
    Incomplete(&'static str),
}

/// One upstream strategy for producing a `T` from a query `Q`.
///
/// Several retrievers for the same payload form a fallback chain.  The query
/// is supplied per call, so a chain can be configured once at startup even
/// when (as with the local city) the coordinates are only known later.
///
/// ## Implementing a new retriever
///
/// ```ignore
/// pub struct MyHeadlines { client: Client, url: String }
///
/// #[async_trait]
/// impl Retriever<(), Vec<NewsItem>> for MyHeadlines {
///     fn name(&self) -> &str { "my-headlines" }
///
///     async fn retrieve(&self, _: &()) -> Result<Vec<NewsItem>, FetchError> {
///         let body: MyResponse = get_json(self.client.get(&self.url)).await?;
///         Ok(news::finalize(body.into_candidates()))
///     }
/// }
/// ```
#[async_trait]
pub trait Retriever<Q, T>: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fetch a fresh payload.
    async fn retrieve(&self, query: &Q) -> Result<T, FetchError>;
}

/// Build the shared HTTP client.
pub fn http_client(config: &HttpConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()
}

/// Send `request` and decode a JSON body, treating non-2xx as failure.
pub(crate) async fn get_json<R: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<R, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn get_json_decodes_success_body() {
        let base = testing::serve(200, r#"{"ok":true}"#).await;
        let ping: Ping = get_json(Client::new().get(base)).await.unwrap();
        assert!(ping.ok);
    }

    #[tokio::test]
    async fn get_json_rejects_non_success_status() {
        let base = testing::serve(503, r#"{"ok":true}"#).await;
        let result = get_json::<Ping>(Client::new().get(base)).await;
        assert!(matches!(result, Err(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn get_json_rejects_malformed_body() {
        let base = testing::serve(200, "<html>rate limited</html>").await;
        let result = get_json::<Ping>(Client::new().get(base)).await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn http_client_builds_from_default_config() {
        assert!(http_client(&HttpConfig::default()).is_ok());
    }
}
