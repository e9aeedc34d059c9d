use anyhow::{Context, Result};
use dom_smoothie::{Config as ReadabilityConfig, Readability, TextMode};
use reqwest::Client;
use tracing::warn;
use url::Url;

use crate::config::WebContentConfig;

/// Fetches an article page and extracts its readable text.
pub struct WebContentFetcher {
    client: Client,
    config: WebContentConfig,
}

impl WebContentFetcher {
    pub fn new(client: Client, config: WebContentConfig) -> Self {
        Self { client, config }
    }

    /// Article text for `raw_url`, or `None` when the page is unavailable or
    /// has no readable content.
    pub async fn fetch_text(&self, raw_url: &str) -> Result<Option<String>> {
        let url = match Url::parse(raw_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Ok(None),
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", url))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let html = response.text().await?;
        Ok(self.extract(&html, url.as_str()))
    }

    fn extract(&self, html: &str, url: &str) -> Option<String> {
        let smoothie_cfg = ReadabilityConfig {
            text_mode: TextMode::Formatted,
            ..Default::default()
        };

        let mut readability = match Readability::new(html, Some(url), Some(smoothie_cfg)) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(target: "collector", error = %err, url = %url, "readability init failed");
                return None;
            }
        };

        let article = match readability.parse() {
            Ok(article) => article,
            Err(err) => {
                warn!(target: "collector", error = %err, url = %url, "readability parse failed");
                return None;
            }
        };

        let text = clamp(article.text_content.trim(), self.config.content_max_length);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn clamp(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
