//! Topic vocabularies and feed list.
//!
//! Loaded from a TOML file when one is configured (or `config/catalog.toml`
//! exists); any list left empty in the file keeps its built-in default.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

const FALLBACK_PATH: &str = "config/catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub source: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub critical_topics: Vec<String>,
    pub secondary_topics: Vec<String>,
    pub irrelevant_keywords: Vec<String>,
    pub feeds: Vec<FeedSource>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    critical_topics: Vec<String>,
    #[serde(default)]
    secondary_topics: Vec<String>,
    #[serde(default)]
    irrelevant_keywords: Vec<String>,
    #[serde(default)]
    feeds: Vec<FeedSource>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            critical_topics: to_owned(DEFAULT_CRITICAL),
            secondary_topics: to_owned(DEFAULT_SECONDARY),
            irrelevant_keywords: to_owned(DEFAULT_IRRELEVANT),
            feeds: default_feeds(),
        }
    }
}

impl Catalog {
    /// 1) explicit path (from `CATALOG_PATH`), which must exist
    /// 2) `config/catalog.toml`
    /// 3) built-in defaults
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit {
            let pb = PathBuf::from(path);
            if !pb.exists() {
                return Err(anyhow!("CATALOG_PATH points to non-existent path {path}"));
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(FALLBACK_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading catalog from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing catalog at {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let defaults = Self::default();
        let feeds: Vec<FeedSource> = file
            .feeds
            .into_iter()
            .map(|feed| FeedSource {
                source: feed.source.trim().to_string(),
                urls: clean_list(feed.urls),
            })
            .filter(|feed| !feed.source.is_empty() && !feed.urls.is_empty())
            .collect();
        Ok(Self {
            critical_topics: or_default(clean_list(file.critical_topics), defaults.critical_topics),
            secondary_topics: or_default(
                clean_list(file.secondary_topics),
                defaults.secondary_topics,
            ),
            irrelevant_keywords: or_default(
                clean_list(file.irrelevant_keywords),
                defaults.irrelevant_keywords,
            ),
            feeds: if feeds.is_empty() { defaults.feeds } else { feeds },
        })
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let trimmed = item.trim();
        if !trimmed.is_empty() && !out.iter().any(|seen| seen.eq_ignore_ascii_case(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn or_default(list: Vec<String>, default: Vec<String>) -> Vec<String> {
    if list.is_empty() {
        default
    } else {
        list
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const DEFAULT_CRITICAL: &[&str] = &[
    "government policy",
    "parliament",
    "lok sabha",
    "rajya sabha",
    "supreme court",
    "high court",
    "constitution",
    "constitutional",
    "union budget",
    "budget",
    "economy",
    "gdp",
    "inflation",
    "reserve bank",
    "rbi",
    "monetary policy",
    "fiscal",
    "international relations",
    "bilateral",
    "treaty",
    "scheme",
    "bill",
    "act",
    "amendment",
    "judgment",
    "verdict",
    "ordinance",
    "governance",
    "polity",
    "election commission",
    "niti aayog",
    "ministry",
    "cabinet",
    "reform",
];

const DEFAULT_SECONDARY: &[&str] = &[
    "policy",
    "agriculture",
    "farmers",
    "defence",
    "space",
    "isro",
    "health",
    "education",
    "infrastructure",
    "environment",
    "climate",
    "biodiversity",
    "pollution",
    "energy",
    "science and technology",
    "technology",
    "social issues",
    "poverty",
    "employment",
    "trade",
    "exports",
    "tariff",
    "security",
    "border",
    "india",
    "government",
    "state government",
    "development",
    "welfare",
    "rights",
    "census",
    "disaster",
    "summit",
    "united nations",
];

const DEFAULT_IRRELEVANT: &[&str] = &[
    "advertisement",
    "classified",
    "classifieds",
    "matrimonial",
    "horoscope",
    "astrology",
    "sports scores",
    "cricket score",
    "ipl",
    "movie review",
    "box office",
    "bollywood",
    "celebrity",
    "entertainment gossip",
    "fashion",
    "recipe",
    "lifestyle",
    "personal advice column",
    "comic strip",
    "crossword",
    "sudoku",
];

fn default_feeds() -> Vec<FeedSource> {
    let feed = |source: &str, urls: &[&str]| FeedSource {
        source: source.to_string(),
        urls: to_owned(urls),
    };
    vec![
        feed("PIB India", &["https://pib.gov.in/RssMain.aspx?ModId=6&Lang=1&Regid=3"]),
        feed(
            "The Hindu",
            &[
                "https://www.thehindu.com/news/national/feeder/default.rss",
                "https://www.thehindu.com/news/international/feeder/default.rss",
                "https://www.thehindu.com/business/feeder/default.rss",
            ],
        ),
        feed(
            "Indian Express",
            &[
                "https://indianexpress.com/section/india/feed/",
                "https://indianexpress.com/section/world/feed/",
                "https://indianexpress.com/section/business/feed/",
            ],
        ),
        feed(
            "Times of India",
            &[
                "https://timesofindia.indiatimes.com/rssfeeds/296589292.cms",
                "https://timesofindia.indiatimes.com/rssfeeds/296589293.cms",
                "https://timesofindia.indiatimes.com/rssfeeds/1898055.cms",
            ],
        ),
        feed(
            "Hindustan Times",
            &[
                "https://www.hindustantimes.com/feeds/rss/india-news/rssfeed.xml",
                "https://www.hindustantimes.com/feeds/rss/world-news/rssfeed.xml",
                "https://www.hindustantimes.com/feeds/rss/business/rssfeed.xml",
            ],
        ),
        feed(
            "Business Standard",
            &[
                "https://www.business-standard.com/rss/economy-106.rss",
                "https://www.business-standard.com/rss/politics-102.rss",
                "https://www.business-standard.com/rss/current-affairs-103.rss",
            ],
        ),
        feed(
            "Livemint",
            &[
                "https://www.livemint.com/rss/politics",
                "https://www.livemint.com/rss/economy",
                "https://www.livemint.com/rss/news",
            ],
        ),
    ]
}
