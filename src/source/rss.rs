//! RSS 2.0 headline retriever.
//!
//! The last link of the headline chain, only present when `endpoints.rss_url`
//! is configured.  Items go through the same [`finalize`] batch rules as the
//! JSON services, so an RSS batch is indistinguishable downstream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use super::news::{finalize, Candidate};
use super::{FetchError, NewsItem, Retriever};

/// Headlines from an RSS feed over HTTP, parsed with the [`rss`](::rss) crate.
pub struct RssHeadlines {
    client: Client,
    /// The feed URL to poll.
    url: String,
    /// Source name attached to every item.
    label: String,
}

impl RssHeadlines {
    pub fn new(client: Client, url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            label: label.into(),
        }
    }

    /// Parse an already-fetched channel (pure, no I/O).
    pub fn parse_channel(channel: &::rss::Channel, label: &str) -> Vec<NewsItem> {
        finalize(channel.items().iter().map(|item| Candidate {
            // Prefer <guid>, fall back to <link>.
            id: item
                .guid()
                .map(|g| g.value().to_string())
                .or_else(|| item.link().map(String::from)),
            title: item.title().map(String::from),
            source: label.to_string(),
            // RFC-2822; an unparseable date degrades to None.
            time: item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }))
    }
}

#[async_trait]
impl Retriever<(), Vec<NewsItem>> for RssHeadlines {
    fn name(&self) -> &str {
        "rss"
    }

    async fn retrieve(&self, _: &()) -> Result<Vec<NewsItem>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let channel = ::rss::Channel::read_from(body.as_ref())?;
        Ok(Self::parse_channel(&channel, &self.label))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing;

    fn channel(xml: &str) -> ::rss::Channel {
        ::rss::Channel::read_from(xml.as_bytes()).unwrap()
    }

    #[test]
    fn parse_channel_extracts_items() {
        let items = RssHeadlines::parse_channel(
            &channel(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://example.com/2</link>
      <guid>guid-2</guid>
    </item>
  </channel>
</rss>"#,
            ),
            "TestFeed",
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "guid-1");
        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].source, "TestFeed");
        assert!(items[0].time.is_some());
        assert_eq!(items[1].id, "guid-2");
        assert!(items[1].time.is_none());
    }

    #[test]
    fn falls_back_to_link_when_no_guid() {
        let items = RssHeadlines::parse_channel(
            &channel(
                r#"<rss version="2.0"><channel><title>T</title>
<item><title>No GUID</title><link>https://example.com/no-guid</link></item>
</channel></rss>"#,
            ),
            "t",
        );

        assert_eq!(items[0].id, "https://example.com/no-guid");
    }

    #[test]
    fn untitled_items_are_dropped() {
        let xml = r#"<rss version="2.0"><channel><title>T</title>
<item><guid>g1</guid></item>
</channel></rss>"#;
        let items = RssHeadlines::parse_channel(&channel(xml), "t");

        assert!(items.is_empty());
    }

    #[test]
    fn invalid_date_degrades_to_none() {
        let items = RssHeadlines::parse_channel(
            &channel(
                r#"<rss version="2.0"><channel><title>T</title>
<item><guid>g1</guid><title>Bad Date</title><pubDate>not-a-real-date</pubDate></item>
</channel></rss>"#,
            ),
            "t",
        );

        assert!(items[0].time.is_none());
    }

    #[tokio::test]
    async fn non_feed_body_fails() {
        let base = testing::serve(200, "{\"not\":\"xml\"}").await;
        let retriever = RssHeadlines::new(Client::new(), base, "Feed");

        let result = retriever.retrieve(&()).await;
        assert!(matches!(result, Err(FetchError::Feed(_))));
    }
}
