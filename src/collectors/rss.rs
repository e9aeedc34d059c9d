use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, stream, StreamExt};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::{web_content::WebContentFetcher, Collector};
use crate::{config::FeedSource, domain::RawItem};

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// One news source backed by one or more RSS feeds.
pub struct RssCollector {
    source: FeedSource,
    client: Client,
    fetcher: Arc<WebContentFetcher>,
    item_limit: usize,
    body_concurrency: usize,
}

impl RssCollector {
    pub fn new(
        source: FeedSource,
        client: Client,
        fetcher: Arc<WebContentFetcher>,
        item_limit: usize,
        body_concurrency: usize,
    ) -> Self {
        Self {
            source,
            client,
            fetcher,
            item_limit,
            body_concurrency: body_concurrency.max(1),
        }
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawItem>> {
        let response = self
            .client
            .get(url)
            .timeout(FEED_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("failed to fetch feed {url}"))?
            .error_for_status()
            .with_context(|| format!("feed {url} returned an error status"))?;
        let xml = response.text().await?;
        parse_feed(&xml, &self.source.source, self.item_limit)
            .with_context(|| format!("parsing feed {url}"))
    }

    async fn with_body(&self, item: RawItem) -> RawItem {
        let Some(link) = item.link.as_deref() else {
            return item;
        };
        match self.fetcher.fetch_text(link).await {
            Ok(Some(text)) => RawItem { body: text, ..item },
            Ok(None) => item,
            Err(err) => {
                tracing::debug!(
                    target: "collector",
                    source = %self.source.source,
                    error = %err,
                    "article body unavailable; using feed description"
                );
                item
            }
        }
    }

    async fn collect_inner(&self) -> Result<Vec<RawItem>> {
        let mut entries = Vec::new();
        let mut failures = 0;
        for url in &self.source.urls {
            match self.fetch_feed(url).await {
                Ok(items) => entries.extend(items),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        target: "collector",
                        source = %self.source.source,
                        error = %err,
                        "feed skipped"
                    );
                }
            }
        }
        if failures == self.source.urls.len() && failures > 0 {
            return Err(anyhow!("all {failures} feeds of {} failed", self.source.source));
        }

        let items = stream::iter(entries)
            .map(|item| self.with_body(item))
            .buffered(self.body_concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(items)
    }
}

impl Collector for RssCollector {
    fn name(&self) -> &str {
        &self.source.source
    }

    fn collect(&self) -> BoxFuture<'_, Result<Vec<RawItem>>> {
        Box::pin(self.collect_inner())
    }
}

/// Parse an RSS document into at most `limit` raw items. The description
/// becomes the provisional body.
pub fn parse_feed(xml: &str, source: &str, limit: usize) -> Result<Vec<RawItem>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    let items = rss
        .channel
        .item
        .into_iter()
        .take(limit)
        .map(|it| RawItem {
            source: source.to_string(),
            title: it.title.unwrap_or_default().trim().to_string(),
            link: it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            published: it.pub_date.as_deref().and_then(parse_pub_date),
            body: it.description.as_deref().map(strip_tags).unwrap_or_default(),
        })
        .collect();
    Ok(items)
}

fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
