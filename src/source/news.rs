//! Headline items and the JSON headline services.
//!
//! Every headline retriever converts its native response into [`NewsItem`]s
//! through [`finalize`], which enforces the batch rules in one place:
//!
//! * items without a title are dropped,
//! * at most [`MAX_HEADLINES`] items are kept, in upstream order,
//! * ids are unique within the batch (see [`finalize`]).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{get_json, FetchError, Retriever};
use crate::cache::Cacheable;
use crate::pipeline::Payload;

/// Headlines retained per fetch.
pub const MAX_HEADLINES: usize = 5;

/// A single headline, normalised from any headline service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Unique within its batch; used to detect a changed headline set.
    pub id: String,
    pub title: String,
    /// Publication or service name shown under the title.
    pub source: String,
    pub time: Option<DateTime<Utc>>,
}

impl Cacheable for Vec<NewsItem> {
    const FIELD: &'static str = "items";
}

impl Payload for Vec<NewsItem> {
    fn is_empty(&self) -> bool {
        <[NewsItem]>::is_empty(self)
    }
}

/// An upstream item before the batch rules are applied.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub id: Option<String>,
    pub title: Option<String>,
    pub source: String,
    pub time: Option<DateTime<Utc>>,
}

/// Apply the batch rules to a list of upstream items.
///
/// An item keeps its upstream id when it has one that is not already taken;
/// otherwise it gets the positional composite `"<index>-<title>"`, suffixed
/// with `-1`, `-2`, … if an upstream id already holds that value.
pub fn finalize(candidates: impl IntoIterator<Item = Candidate>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();

    candidates
        .into_iter()
        .filter_map(|c| {
            let title = c.title?.trim().to_string();
            (!title.is_empty()).then_some((c.id, title, c.source, c.time))
        })
        .take(MAX_HEADLINES)
        .enumerate()
        .map(|(index, (id, title, source, time))| {
            let id = match id.filter(|id| !id.is_empty()) {
                Some(id) if seen.insert(id.clone()) => id,
                _ => unclaimed(&mut seen, format!("{index}-{title}")),
            };
            NewsItem {
                id,
                title,
                source,
                time,
            }
        })
        .collect()
}

/// Claim `base`, or the first free `base-<n>`.
fn unclaimed(seen: &mut HashSet<String>, base: String) -> String {
    let mut id = base.clone();
    let mut n = 0;
    while !seen.insert(id.clone()) {
        n += 1;
        id = format!("{base}-{n}");
    }
    id
}

// ---------------------------------------------------------------------------
// Service A: Hacker News via Algolia
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct HnResponse {
    #[serde(default)]
    hits: Vec<HnHit>,
}

#[derive(Debug, Deserialize)]
struct HnHit {
    #[serde(rename = "objectID")]
    object_id: Option<String>,
    title: Option<String>,
    created_at: Option<String>,
}

pub struct HackerNewsHeadlines {
    client: Client,
    url: String,
}

impl HackerNewsHeadlines {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub(crate) fn map_hits(response: HnResponse) -> Vec<NewsItem> {
        finalize(response.hits.into_iter().map(|hit| Candidate {
            id: hit.object_id,
            title: hit.title,
            source: "Hacker News".to_string(),
            time: hit
                .created_at
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|t| t.with_timezone(&Utc)),
        }))
    }
}

#[async_trait]
impl Retriever<(), Vec<NewsItem>> for HackerNewsHeadlines {
    fn name(&self) -> &str {
        "hacker-news"
    }

    async fn retrieve(&self, _: &()) -> Result<Vec<NewsItem>, FetchError> {
        let body: HnResponse = get_json(self.client.get(&self.url)).await?;
        Ok(Self::map_hits(body))
    }
}

// ---------------------------------------------------------------------------
// Service B: GDELT doc API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GdeltResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

#[derive(Debug, Deserialize)]
struct GdeltArticle {
    url: Option<String>,
    title: Option<String>,
    /// `20250601T093000Z`
    seendate: Option<String>,
    sourcecountry: Option<String>,
    source: Option<String>,
}

pub struct GdeltHeadlines {
    client: Client,
    url: String,
}

impl GdeltHeadlines {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub(crate) fn map_articles(response: GdeltResponse) -> Vec<NewsItem> {
        finalize(response.articles.into_iter().map(|article| Candidate {
            id: article.url,
            title: article.title,
            source: [article.sourcecountry, article.source]
                .into_iter()
                .flatten()
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| "GDELT".to_string()),
            time: article.seendate.as_deref().and_then(parse_seendate),
        }))
    }
}

fn parse_seendate(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl Retriever<(), Vec<NewsItem>> for GdeltHeadlines {
    fn name(&self) -> &str {
        "gdelt"
    }

    async fn retrieve(&self, _: &()) -> Result<Vec<NewsItem>, FetchError> {
        let body: GdeltResponse = get_json(self.client.get(&self.url)).await?;
        Ok(Self::map_articles(body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing;
    use chrono::TimeZone;

    fn candidate(id: Option<&str>, title: Option<&str>) -> Candidate {
        Candidate {
            id: id.map(String::from),
            title: title.map(String::from),
            source: "test".into(),
            time: None,
        }
    }

    const EIGHT_HITS: &str = r#"{"hits":[
        {"objectID":"1","title":"One","created_at":"2025-06-01T09:30:00.000Z"},
        {"objectID":"2","title":"Two","created_at":"2025-06-01T09:00:00.000Z"},
        {"objectID":"3","title":"Three","created_at":"2025-06-01T08:30:00.000Z"},
        {"objectID":"4","title":"Four","created_at":"2025-06-01T08:00:00.000Z"},
        {"objectID":"5","title":"Five","created_at":"2025-06-01T07:30:00.000Z"},
        {"objectID":"6","title":"Six","created_at":"2025-06-01T07:00:00.000Z"},
        {"objectID":"7","title":"Seven","created_at":"2025-06-01T06:30:00.000Z"},
        {"objectID":"8","title":"Eight","created_at":"2025-06-01T06:00:00.000Z"}
    ]}"#;

    // -- finalize ------------------------------------------------------------

    #[test]
    fn keeps_at_most_five_in_upstream_order() {
        let items = finalize((1..=8).map(|i| {
            let id = i.to_string();
            candidate(Some(&id), Some(&format!("T{i}")))
        }));
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn drops_untitled_items_before_truncating() {
        let items = finalize(vec![
            candidate(Some("a"), None),
            candidate(Some("b"), Some("   ")),
            candidate(Some("c"), Some("Kept")),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "c");
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn missing_id_falls_back_to_positional_composite() {
        let items = finalize(vec![
            candidate(Some("x"), Some("First")),
            candidate(None, Some("Second")),
        ]);
        assert_eq!(items[1].id, "1-Second");
    }

    #[test]
    fn composite_id_never_collides_with_upstream_id() {
        let items = finalize(vec![
            candidate(Some("1-Bar"), Some("Foo")),
            candidate(None, Some("Bar")),
            candidate(Some("2-Baz"), Some("Baz")),
            candidate(Some("2-Baz"), Some("Baz")),
        ]);

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1-Bar", "1-Bar-1", "2-Baz", "3-Baz"]);
    }

    #[test]
    fn composite_suffix_skips_every_taken_value() {
        let items = finalize(vec![
            candidate(Some("1-Bar"), Some("A")),
            candidate(None, Some("Bar")),
            candidate(Some("1-Bar-1"), Some("C")),
        ]);
        // The upstream "1-Bar-1" arrives after the composite claimed it.
        assert_eq!(items[1].id, "1-Bar-1");
        assert_eq!(items[2].id, "2-C");

        let unique: HashSet<_> = items.iter().map(|i| &i.id).collect();
        assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn duplicate_ids_are_made_unique() {
        let items = finalize(vec![
            candidate(Some("dup"), Some("First")),
            candidate(Some("dup"), Some("Second copy")),
            candidate(Some(""), Some("Blank id")),
        ]);

        assert_eq!(items[0].id, "dup");
        assert_eq!(items[1].id, "1-Second copy");
        assert_eq!(items[2].id, "2-Blank id");
        let unique: HashSet<_> = items.iter().map(|i| &i.id).collect();
        assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn empty_batch_is_empty_payload() {
        let items = finalize(Vec::new());
        assert!(Payload::is_empty(&items));
    }

    // -- service A -----------------------------------------------------------

    #[test]
    fn eight_hits_become_five_items() {
        let response: HnResponse = serde_json::from_str(EIGHT_HITS).unwrap();
        let items = HackerNewsHeadlines::map_hits(response);

        assert_eq!(items.len(), 5);
        assert_eq!(items[0].title, "One");
        assert_eq!(items[0].source, "Hacker News");
        let published = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(items[0].time, Some(published));
    }

    #[test]
    fn hits_field_missing_yields_no_items() {
        let response: HnResponse = serde_json::from_str("{}").unwrap();
        assert!(HackerNewsHeadlines::map_hits(response).is_empty());
    }

    #[tokio::test]
    async fn hacker_news_over_http() {
        let base = testing::serve(200, EIGHT_HITS).await;
        let url = format!("{base}/api/v1/search?tags=front_page");
        let retriever = HackerNewsHeadlines::new(Client::new(), url);

        let items = retriever.retrieve(&()).await.unwrap();
        assert_eq!(items.len(), 5);
    }

    // -- service B -----------------------------------------------------------

    const GDELT_ARTICLES: &str = r#"{"articles":[
        {"url":"https://a.example/1","title":"Alpha",
         "seendate":"20250601T093000Z","sourcecountry":"France"},
        {"title":"Beta","seendate":"garbage","source":"Wire"},
        {"title":"Gamma"},
        {"title":"Delta","sourcecountry":"","source":"Reuters"},
        {"title":"Epsilon","sourcecountry":"","source":""}
    ]}"#;

    #[test]
    fn maps_gdelt_articles() {
        let response: GdeltResponse = serde_json::from_str(GDELT_ARTICLES).unwrap();
        let items = GdeltHeadlines::map_articles(response);

        assert_eq!(items.len(), 5);
        assert_eq!(items[0].id, "https://a.example/1");
        assert_eq!(items[0].source, "France");
        let seen = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(items[0].time, Some(seen));
        assert_eq!(items[1].id, "1-Beta");
        assert_eq!(items[1].source, "Wire");
        assert!(items[1].time.is_none());
        assert_eq!(items[2].source, "GDELT");
    }

    #[test]
    fn empty_source_country_falls_through_to_source() {
        let response: GdeltResponse = serde_json::from_str(GDELT_ARTICLES).unwrap();
        let items = GdeltHeadlines::map_articles(response);

        assert_eq!(items[3].source, "Reuters");
        assert_eq!(items[4].source, "GDELT");
    }

    #[tokio::test]
    async fn gdelt_non_json_body_fails() {
        let base = testing::serve(200, "Please limit requests").await;
        let retriever = GdeltHeadlines::new(Client::new(), base);

        let result = retriever.retrieve(&()).await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }
}
