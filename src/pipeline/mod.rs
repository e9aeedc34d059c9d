//! The two digest flows, daily news and uploaded documents, built from the
//! same stages: normalize, keyword filter, size, analyze.

pub mod classifier;
pub mod engine;
pub mod normalizer;
pub mod parser;
pub mod progress;
pub mod sizer;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    ai::PromptTemplate,
    collectors::{collect_all, document, Collector, SourceTally},
    config::PipelineConfig,
    domain::{AnalysisResult, CandidateItem, Phase, RawItem, Slot, TaskState},
    error::RunError,
};

pub use classifier::{FilterReport, RelevanceClassifier};
pub use engine::{AnalysisBackend, AnalysisEngine, EngineSettings};
pub use progress::{spawn_reporter, ProgressTracker, ProgressTransport};
pub use sizer::BatchBounds;

/// Counts describing one run, stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub found: usize,
    pub duplicates: usize,
    pub untitled: usize,
    pub filter: FilterReport,
    pub truncated: usize,
    pub placeholders: usize,
    pub scheduled: usize,
    pub succeeded: usize,
    /// Succeeded only after one or more retries.
    pub retried: usize,
    pub failed: usize,
    pub kept: usize,
    pub rejected: usize,
    pub sources: Vec<SourceTally>,
}

impl RunSummary {
    pub fn render_text(&self) -> String {
        let mut lines = vec![
            format!("🔎 Found: {} items", self.found),
            format!(
                "🧹 Duplicates removed: {} | Untitled: {}",
                self.duplicates, self.untitled
            ),
            format!(
                "🎯 Keyword filter: {} admitted, {} rejected (short {}, off-topic {}, irrelevant {})",
                self.filter.admitted,
                self.filter.rejected(),
                self.filter.too_short,
                self.filter.off_topic,
                self.filter.vetoed
            ),
        ];
        if self.truncated > 0 {
            lines.push(format!("✂️ Over batch limit, skipped: {}", self.truncated));
        }
        if self.placeholders > 0 {
            lines.push(format!("➕ Placeholder slots: {}", self.placeholders));
        }
        lines.push(format!(
            "🤖 Analyzed: {} | ✅ {} | ❌ {}",
            self.scheduled, self.succeeded, self.failed
        ));
        if self.retried > 0 {
            lines.push(format!("🔁 Needed a retry: {}", self.retried));
        }
        if self.rejected > 0 {
            lines.push(format!(
                "📌 Kept: {} | Judged not relevant: {}",
                self.kept, self.rejected
            ));
        } else {
            lines.push(format!("📌 Kept: {}", self.kept));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestKind {
    News,
    Document { file_name: String },
}

impl DigestKind {
    pub fn template(&self) -> PromptTemplate {
        match self {
            DigestKind::News => PromptTemplate::NewsDigest,
            DigestKind::Document { .. } => PromptTemplate::DocumentScreening,
        }
    }
}

/// Everything a finished run produced, slots in batch order.
#[derive(Debug, Clone)]
pub struct Digest {
    pub kind: DigestKind,
    pub summary: RunSummary,
    pub slots: Vec<Slot>,
    pub generated_at: DateTime<Utc>,
}

impl Digest {
    /// Successful results that belong in the report, in batch order.
    pub fn kept(&self) -> impl Iterator<Item = (&CandidateItem, &AnalysisResult)> + '_ {
        let gated = self.kind.template().gates_on_verdict();
        self.slots
            .iter()
            .filter_map(Slot::result)
            .filter(move |(_, result)| !gated || result.relevance.is_relevant())
    }

    /// Items that never produced a result, with the last error seen.
    pub fn failures(&self) -> impl Iterator<Item = (&CandidateItem, u32, &str)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Failed {
                candidate,
                attempts,
                error,
                ..
            } => Some((candidate, *attempts, error.as_str())),
            _ => None,
        })
    }
}

pub struct Pipeline {
    collectors: Vec<Box<dyn Collector>>,
    classifier: RelevanceClassifier,
    engine: AnalysisEngine,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        classifier: RelevanceClassifier,
        engine: AnalysisEngine,
        config: PipelineConfig,
    ) -> Self {
        Self {
            collectors,
            classifier,
            engine,
            config,
        }
    }

    pub fn source_count(&self) -> usize {
        self.collectors.len()
    }

    pub async fn run_news(&self, progress: &ProgressTracker) -> Result<Digest, RunError> {
        progress.set_phase(Phase::Collecting);
        let collected = collect_all(&self.collectors).await;
        if collected.items.is_empty() {
            return Err(RunError::CollectionOutage {
                sources: self.collectors.len(),
            });
        }
        tracing::info!(
            target: "pipeline",
            items = collected.items.len(),
            reachable = collected.reachable_sources(),
            sources = self.collectors.len(),
            "news collected"
        );
        self.process(
            DigestKind::News,
            collected.items,
            collected.tallies,
            self.config.news_bounds,
            progress,
        )
        .await
    }

    pub async fn run_document(
        &self,
        file_name: &str,
        text: &str,
        progress: &ProgressTracker,
    ) -> Result<Digest, RunError> {
        progress.set_phase(Phase::Collecting);
        let items = document::segment(text, file_name);
        if items.is_empty() {
            return Err(RunError::EmptyDocument);
        }
        let tally = SourceTally {
            source: file_name.to_string(),
            count: items.len(),
            error: None,
        };
        tracing::info!(target: "pipeline", segments = items.len(), "document segmented");
        self.process(
            DigestKind::Document {
                file_name: file_name.to_string(),
            },
            items,
            vec![tally],
            self.config.document_bounds,
            progress,
        )
        .await
    }

    async fn process(
        &self,
        kind: DigestKind,
        raw: Vec<RawItem>,
        sources: Vec<SourceTally>,
        bounds: BatchBounds,
        progress: &ProgressTracker,
    ) -> Result<Digest, RunError> {
        progress.set_phase(Phase::Filtering);
        let found = raw.len();
        let normalized = normalizer::normalize(raw, self.config.dedup_threshold);
        let (admitted, filter) = self.classifier.filter(normalized.items);
        let batch = sizer::size_batch(admitted, bounds);

        let mut summary = RunSummary {
            found,
            duplicates: normalized.duplicates,
            untitled: normalized.untitled,
            filter,
            truncated: batch.truncated,
            placeholders: batch.placeholders,
            scheduled: batch.real_count(),
            sources,
            ..RunSummary::default()
        };

        let template = kind.template();
        let slots = self.engine.run(batch, template, progress).await;
        progress.set_phase(Phase::Rendering);

        let digest = Digest {
            kind,
            summary: RunSummary::default(),
            slots,
            generated_at: Utc::now(),
        };
        for slot in &digest.slots {
            match slot.state() {
                Some(TaskState::Succeeded) => summary.succeeded += 1,
                Some(_) => summary.failed += 1,
                None => {}
            }
            if slot.was_retried() {
                summary.retried += 1;
            }
        }
        summary.kept = digest.kept().count();
        summary.rejected = summary.succeeded - summary.kept;

        tracing::info!(
            target: "pipeline",
            template = template.name(),
            found = summary.found,
            admitted = summary.filter.admitted,
            scheduled = summary.scheduled,
            succeeded = summary.succeeded,
            failed = summary.failed,
            kept = summary.kept,
            "run finished"
        );
        Ok(Digest { summary, ..digest })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        collectors::testing::StaticCollector,
        config::Catalog,
        error::AnalysisError,
        pipeline::engine::RetryPolicy,
    };

    struct Canned(&'static str);

    impl AnalysisBackend for Canned {
        fn analyze<'a>(
            &'a self,
            _text: &'a str,
            _template: PromptTemplate,
        ) -> BoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move { Ok(self.0.to_string()) })
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            critical_topics: vec!["parliament".into(), "supreme court".into()],
            secondary_topics: vec!["health".into(), "environment".into()],
            irrelevant_keywords: vec!["cricket".into()],
            feeds: Vec::new(),
        }
    }

    fn body(topic: &str) -> String {
        format!("{topic} {}", "filler ".repeat(110))
    }

    fn relevant(source: &str, title: &str) -> RawItem {
        RawItem::new(source, title, body("parliament and the supreme court"))
    }

    fn pipeline(collectors: Vec<Box<dyn Collector>>, response: &'static str, config: PipelineConfig) -> Pipeline {
        pipeline_with(collectors, Arc::new(Canned(response)), config)
    }

    fn pipeline_with(
        collectors: Vec<Box<dyn Collector>>,
        backend: Arc<dyn AnalysisBackend>,
        config: PipelineConfig,
    ) -> Pipeline {
        let classifier = RelevanceClassifier::from_config(&catalog(), &config).unwrap();
        let settings = EngineSettings {
            max_concurrency: 10,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_jitter: Duration::ZERO,
            },
            attempt_timeout: Duration::from_secs(5),
            max_input_chars: 500,
        };
        let engine = AnalysisEngine::new(backend, settings);
        Pipeline::new(collectors, classifier, engine, config)
    }

    #[tokio::test]
    async fn news_run_over_three_sources_pads_to_minimum() {
        let a = (0..5)
            .map(|i| relevant("A", &format!("alpha headline number {i}")))
            .collect();
        let b = vec![
            relevant("B", "bravo headline number 0"),
            relevant("B", "bravo headline number 1"),
            RawItem::new("B", "bravo short one", "parliament supreme court"),
            RawItem::new("B", "bravo short two", "too short"),
        ];
        let c = vec![
            relevant("C", "alpha headline number 0"),
            relevant("C", "charlie headline number 1"),
            relevant("C", "charlie headline number 2"),
            RawItem::new("C", "charlie cricket", body("parliament supreme court cricket")),
            RawItem::new("C", "charlie weather", body("sunny skies")),
        ];
        let config = PipelineConfig {
            news_bounds: BatchBounds::new(Some(10), Some(12)),
            ..PipelineConfig::default()
        };
        let collectors = vec![
            StaticCollector::ok("A", a),
            StaticCollector::ok("B", b),
            StaticCollector::ok("C", c),
        ];
        let pipeline = pipeline(collectors, "Key Points:\n• point", config);
        let tracker = ProgressTracker::new();
        let digest = pipeline.run_news(&tracker).await.unwrap();

        let s = &digest.summary;
        assert_eq!(s.found, 14);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.filter.admitted, 9);
        assert_eq!(s.filter.rejected(), 4);
        assert_eq!(digest.slots.len(), 10);
        assert_eq!(s.placeholders, 1);
        assert!(matches!(digest.slots[9], Slot::Placeholder));
        assert_eq!((s.scheduled, s.succeeded, s.failed, s.kept), (9, 9, 0, 9));
        assert_eq!(s.retried, 0);
        assert_eq!(digest.failures().count(), 0);
        assert_eq!(tracker.snapshot().phase, Phase::Rendering);
        let sources: Vec<_> = digest.kept().map(|(c, _)| c.source.as_str()).collect();
        assert_eq!(sources[..5], ["A"; 5]);
    }

    #[tokio::test]
    async fn all_sources_down_is_an_outage() {
        let collectors = vec![StaticCollector::failing("A"), StaticCollector::failing("B")];
        let pipeline = pipeline(collectors, "", PipelineConfig::default());
        let err = pipeline.run_news(&ProgressTracker::new()).await.unwrap_err();
        assert!(matches!(err, RunError::CollectionOutage { sources: 2 }));
    }

    #[tokio::test]
    async fn document_results_without_a_yes_are_not_kept() {
        let text = format!(
            "Parliament session\n{}\n\nSupreme Court verdict\n{}",
            body("parliament supreme court"),
            body("supreme court parliament")
        );
        let pipeline = pipeline(
            Vec::new(),
            "Summary:\nSomething happened.",
            PipelineConfig::default(),
        );
        let digest = pipeline
            .run_document("paper.txt", &text, &ProgressTracker::new())
            .await
            .unwrap();

        assert_eq!(digest.summary.succeeded, 2);
        assert_eq!(digest.summary.kept, 0);
        assert_eq!(digest.summary.rejected, 2);
        assert_eq!(digest.kept().count(), 0);
    }

    #[tokio::test]
    async fn document_results_with_yes_are_kept() {
        let text = format!("Parliament session\n{}", body("parliament supreme court"));
        let pipeline = pipeline(
            Vec::new(),
            "RELEVANT: YES\nSummary:\nSomething happened.",
            PipelineConfig::default(),
        );
        let digest = pipeline
            .run_document("paper.txt", &text, &ProgressTracker::new())
            .await
            .unwrap();
        assert_eq!(digest.summary.kept, 1);
        assert!(digest.summary.render_text().contains("Kept: 1"));
    }

    /// Rejects "Doomed" outright and fails "Shaky" once before answering.
    #[derive(Default)]
    struct Flaky {
        shaken: AtomicBool,
    }

    impl AnalysisBackend for Flaky {
        fn analyze<'a>(
            &'a self,
            text: &'a str,
            _template: PromptTemplate,
        ) -> BoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move {
                if text.contains("Doomed") {
                    return Err(AnalysisError::Permanent("400 bad request".into()));
                }
                if text.contains("Shaky") && !self.shaken.swap(true, Ordering::SeqCst) {
                    return Err(AnalysisError::Transient("503".into()));
                }
                Ok("RELEVANT: YES\nSummary:\nok".to_string())
            })
        }
    }

    #[tokio::test]
    async fn failed_and_retried_items_are_accounted_for() {
        let text = format!(
            "Parliament session\n{}\n\nDoomed Supreme Court story\n{}\n\nShaky budget debate\n{}",
            body("parliament supreme court"),
            body("supreme court parliament"),
            body("parliament and supreme court")
        );
        let pipeline = pipeline_with(Vec::new(), Arc::new(Flaky::default()), PipelineConfig::default());
        let digest = pipeline
            .run_document("paper.txt", &text, &ProgressTracker::new())
            .await
            .unwrap();

        let s = &digest.summary;
        assert_eq!((s.scheduled, s.succeeded, s.failed, s.retried), (3, 2, 1, 1));
        let failures: Vec<_> = digest.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.title, "Doomed Supreme Court story");
        assert_eq!(failures[0].1, 1);
        assert!(failures[0].2.contains("400"));
        assert!(s.render_text().contains("Needed a retry: 1"));
    }

    #[tokio::test]
    async fn blank_document_is_rejected() {
        let pipeline = pipeline(Vec::new(), "", PipelineConfig::default());
        let err = pipeline
            .run_document("blank.txt", "\n\n  \n", &ProgressTracker::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::EmptyDocument));
    }
}
