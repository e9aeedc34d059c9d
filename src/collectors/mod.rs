pub mod document;
pub mod rss;
pub mod web_content;

use anyhow::Result;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;

use crate::domain::RawItem;

pub use rss::RssCollector;
pub use web_content::WebContentFetcher;

/// A source of raw news items.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn collect(&self) -> BoxFuture<'_, Result<Vec<RawItem>>>;
}

/// What one collector contributed to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTally {
    pub source: String,
    pub count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct Collected {
    pub items: Vec<RawItem>,
    pub tallies: Vec<SourceTally>,
}

impl Collected {
    pub fn reachable_sources(&self) -> usize {
        self.tallies.iter().filter(|t| t.error.is_none()).count()
    }
}

/// Run every collector concurrently. Failures become an empty contribution
/// and a tally with the error; items keep collector order.
pub async fn collect_all(collectors: &[Box<dyn Collector>]) -> Collected {
    let results = join_all(collectors.iter().map(|c| c.collect())).await;

    let mut out = Collected::default();
    for (collector, result) in collectors.iter().zip(results) {
        match result {
            Ok(items) => {
                tracing::info!(
                    target: "collector",
                    source = collector.name(),
                    count = items.len(),
                    "source collected"
                );
                out.tallies.push(SourceTally {
                    source: collector.name().to_string(),
                    count: items.len(),
                    error: None,
                });
                out.items.extend(items);
            }
            Err(err) => {
                tracing::warn!(
                    target: "collector",
                    source = collector.name(),
                    error = %err,
                    "source failed"
                );
                out.tallies.push(SourceTally {
                    source: collector.name().to_string(),
                    count: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::testing::StaticCollector;
    use super::*;

    #[tokio::test]
    async fn failing_sources_contribute_nothing() {
        let collectors = vec![
            StaticCollector::ok("A", vec![RawItem::new("A", "one", "")]),
            StaticCollector::failing("B"),
            StaticCollector::ok("C", vec![RawItem::new("C", "two", ""), RawItem::new("C", "three", "")]),
        ];
        let collected = collect_all(&collectors).await;

        assert_eq!(collected.items.len(), 3);
        assert_eq!(collected.items[0].title, "one");
        assert_eq!(collected.reachable_sources(), 2);
        assert_eq!(collected.tallies[1].count, 0);
        assert!(collected.tallies[1].error.is_some());
    }
}
