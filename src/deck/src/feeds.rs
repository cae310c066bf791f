//! RSS fetching and headline extraction.

use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use rss::Channel;
use tracing::{debug, warn};

use crate::{DeckError, FeedItem};

/// Source name used when a feed has no channel title
pub const FALLBACK_SOURCE: &str = "News Source";

#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DeckError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch one feed and return up to `limit` headlines
    pub async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<FeedItem>, DeckError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeckError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.bytes().await?;
        let items = parse_feed(&body, limit)?;
        debug!(url, items = items.len(), "feed fetched");
        Ok(items)
    }

    /// Fetch all feeds concurrently; failed feeds are logged and skipped
    pub async fn fetch_all(&self, urls: &[String], limit: usize) -> Vec<FeedItem> {
        let results = join_all(
            urls.iter()
                .map(|url| async move { (url, self.fetch(url, limit).await) }),
        )
        .await;

        let mut items = Vec::new();
        for (url, result) in results {
            match result {
                Ok(mut feed_items) => items.append(&mut feed_items),
                Err(e) => warn!(url = %url, error = %e, "skipping feed"),
            }
        }
        items
    }
}

/// Parse an RSS document into headline items
pub fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<FeedItem>, DeckError> {
    let channel = Channel::read_from(body).map_err(|e| DeckError::Parse(e.to_string()))?;

    let source = match channel.title().trim() {
        "" => FALLBACK_SOURCE.to_string(),
        title => unescape_html(title),
    };

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| item.title())
        .map(|title| unescape_html(title.trim()))
        .filter(|title| !title.is_empty())
        .take(limit)
        .map(|text| FeedItem {
            text,
            source: source.clone(),
        })
        .collect())
}

/// Decode HTML entities that survive XML parsing (double-escaped titles).
pub fn unescape_html(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>BBC News</title>
    <link>https://www.bbc.co.uk/news</link>
    <description>World</description>
    <item><title>Talks resume &amp;#8217;cautiously&amp;#8217;</title></item>
    <item><title>   </title></item>
    <item><title>Floods hit coastal towns</title></item>
    <item><description>no title here</description></item>
    <item><title>Markets rally &amp;amp; recover</title></item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_decodes_and_skips_blank_titles() {
        let items = parse_feed(FEED.as_bytes(), 10).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Talks resume \u{2019}cautiously\u{2019}",
                "Floods hit coastal towns",
                "Markets rally & recover",
            ]
        );
        assert!(items.iter().all(|i| i.source == "BBC News"));
    }

    #[test]
    fn test_parse_feed_respects_limit() {
        assert_eq!(parse_feed(FEED.as_bytes(), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_untitled_channel_gets_fallback_source() {
        let feed = r#"<rss version="2.0"><channel><title></title><link>x</link>
            <description>d</description><item><title>Hi</title></item></channel></rss>"#;
        let items = parse_feed(feed.as_bytes(), 4).unwrap();
        assert_eq!(items[0].source, FALLBACK_SOURCE);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            parse_feed(b"<html>nope</html>", 4),
            Err(DeckError::Parse(_))
        ));
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(unescape_html("&#x27;hex&#39;"), "'hex'");
        assert_eq!(unescape_html("caf&eacute; &hellip;"), "caf\u{e9} \u{2026}");
        assert_eq!(unescape_html("&pound;5bn deal"), "\u{a3}5bn deal");
        assert_eq!(unescape_html("&euro;2 for Chlo&euml;"), "\u{20ac}2 for Chlo\u{eb}");
        assert_eq!(unescape_html("AT&T earnings"), "AT&T earnings");
        assert_eq!(unescape_html("dangling &"), "dangling &");
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failed_feeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(Duration::from_secs(2)).unwrap();
        let urls = vec![
            format!("{}/down.xml", server.uri()),
            format!("{}/good.xml", server.uri()),
        ];
        let items = fetcher.fetch_all(&urls, 2).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].text, "Floods hit coastal towns");
    }

    #[tokio::test]
    async fn test_fetch_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(Duration::from_secs(2)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }
}
