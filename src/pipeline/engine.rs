//! Phase 2: bounded-concurrency analysis of a sized batch.
//!
//! Every real entry gets its own retrying future; a shared semaphore caps the
//! number of external calls in flight. A permit is held only for the duration
//! of a single attempt and released before any backoff sleep.

use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use rand::Rng;
use tokio::sync::Semaphore;

use super::{parser::parse_response, progress::ProgressTracker, sizer::SizedBatch};
use crate::{
    ai::PromptTemplate,
    config::PipelineConfig,
    domain::{AnalysisResult, AnalysisTask, BatchEntry, CandidateItem, Slot, TaskState},
    error::AnalysisError,
};

/// The external analysis service.
pub trait AnalysisBackend: Send + Sync {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        template: PromptTemplate,
    ) -> BoxFuture<'a, Result<String, AnalysisError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        backoff.saturating_add(jitter)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Upper bound on one attempt, on top of any client-side timeout.
    pub attempt_timeout: Duration,
    /// Characters of item body sent to the backend.
    pub max_input_chars: usize,
}

impl EngineSettings {
    pub fn from_config(config: &PipelineConfig, attempt_timeout: Duration) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            retry: RetryPolicy {
                max_attempts: config.retry_attempts.max(1),
                base_delay: config.backoff_base,
                max_jitter: Duration::from_secs(1),
            },
            attempt_timeout,
            max_input_chars: 4_000,
        }
    }
}

pub struct AnalysisEngine {
    backend: Arc<dyn AnalysisBackend>,
    settings: EngineSettings,
}

impl AnalysisEngine {
    pub fn new(backend: Arc<dyn AnalysisBackend>, settings: EngineSettings) -> Self {
        Self { backend, settings }
    }

    /// Analyze every real entry of `batch`.
    ///
    /// The returned slots line up one-to-one with `batch.entries`, whatever
    /// order the calls complete in. Placeholders are never sent out.
    pub async fn run(
        &self,
        batch: SizedBatch,
        template: PromptTemplate,
        progress: &ProgressTracker,
    ) -> Vec<Slot> {
        let total = batch.real_count();
        progress.begin(total);
        tracing::info!(
            target: "pipeline",
            template = template.name(),
            items = total,
            placeholders = batch.placeholders,
            concurrency = self.settings.max_concurrency,
            "analysis started"
        );

        let semaphore = Semaphore::new(self.settings.max_concurrency.max(1));
        let mut slots: Vec<Option<Slot>> = vec![None; batch.entries.len()];
        let mut pending = FuturesUnordered::new();

        for (index, entry) in batch.entries.into_iter().enumerate() {
            match entry {
                BatchEntry::Placeholder => slots[index] = Some(Slot::Placeholder),
                BatchEntry::Real(candidate) => {
                    pending.push(self.analyze_item(index, candidate, template, &semaphore))
                }
            }
        }

        while let Some((index, slot)) = pending.next().await {
            match slot.state() {
                Some(TaskState::Succeeded) => progress.record_success(),
                Some(_) => progress.record_failure(),
                None => {}
            }
            slots[index] = Some(slot);
        }

        let slots: Vec<Slot> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Slot::Placeholder))
            .collect();
        let snapshot = progress.snapshot();
        tracing::info!(
            target: "pipeline",
            template = template.name(),
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            "analysis finished"
        );
        slots
    }

    async fn analyze_item(
        &self,
        index: usize,
        candidate: CandidateItem,
        template: PromptTemplate,
        semaphore: &Semaphore,
    ) -> (usize, Slot) {
        let text = candidate.analysis_text(self.settings.max_input_chars);
        let mut task = AnalysisTask::new(candidate);

        loop {
            let outcome = {
                let Ok(_permit) = semaphore.acquire().await else {
                    task.fail_permanent();
                    return (index, failed(task, "analysis pool closed".to_string()));
                };
                task.begin_attempt();
                self.attempt(&text, template).await
            };

            match outcome {
                Ok(result) => {
                    task.succeed();
                    if task.attempts > 1 {
                        tracing::debug!(
                            target: "pipeline",
                            sequence = task.candidate.sequence,
                            attempts = task.attempts,
                            "item succeeded after retry"
                        );
                    }
                    let slot = Slot::Analyzed {
                        candidate: task.candidate,
                        result,
                        attempts: task.attempts,
                    };
                    return (index, slot);
                }
                Err(err) if err.is_transient() => {
                    if !task.fail_transient(self.settings.retry.max_attempts) {
                        tracing::warn!(
                            target: "pipeline",
                            sequence = task.candidate.sequence,
                            attempts = task.attempts,
                            error = %err,
                            "retries exhausted"
                        );
                        return (index, failed(task, err.to_string()));
                    }
                    let delay = self.settings.retry.delay_for(task.attempts);
                    tracing::debug!(
                        target: "pipeline",
                        sequence = task.candidate.sequence,
                        attempt = task.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    task.retry();
                }
                Err(err) => {
                    task.fail_permanent();
                    tracing::warn!(
                        target: "pipeline",
                        sequence = task.candidate.sequence,
                        error = %err,
                        "permanent failure; not retrying"
                    );
                    return (index, failed(task, err.to_string()));
                }
            }
        }
    }

    async fn attempt(
        &self,
        text: &str,
        template: PromptTemplate,
    ) -> Result<AnalysisResult, AnalysisError> {
        let call = self.backend.analyze(text, template);
        let raw = tokio::time::timeout(self.settings.attempt_timeout, call)
            .await
            .map_err(|_| AnalysisError::Transient("analysis call timed out".to_string()))??;
        Ok(parse_response(template, &raw)?)
    }
}

fn failed(task: AnalysisTask, error: String) -> Slot {
    Slot::Failed {
        candidate: task.candidate,
        attempts: task.attempts,
        state: task.state,
        error,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use parking_lot::Mutex;

    use super::*;
    use crate::pipeline::{
        progress::{spawn_reporter, ProgressTransport},
        sizer::{size_batch, BatchBounds},
    };

    const OK_RESPONSE: &str = "Key Points:\n• something happened";

    fn items(n: usize) -> Vec<CandidateItem> {
        (0..n)
            .map(|i| CandidateItem {
                sequence: i,
                title: format!("story {i:02}"),
                comparison_title: format!("story {i:02}"),
                body: "body".into(),
                source: "test".into(),
                link: None,
                published: None,
            })
            .collect()
    }

    fn settings(max_concurrency: usize) -> EngineSettings {
        EngineSettings {
            max_concurrency,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_jitter: Duration::from_millis(1),
            },
            attempt_timeout: Duration::from_secs(5),
            max_input_chars: 100,
        }
    }

    fn title_of(text: &str) -> String {
        text.lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("Title: ")
            .to_string()
    }

    /// Scripted backend: per-title queue of failures before success.
    #[derive(Default)]
    struct Scripted {
        failures: Mutex<HashMap<String, Vec<AnalysisError>>>,
        calls: Mutex<HashMap<String, u32>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn fail(self, title: &str, errors: Vec<AnalysisError>) -> Self {
            self.failures.lock().insert(title.to_string(), errors);
            self
        }

        fn calls_for(&self, title: &str) -> u32 {
            self.calls.lock().get(title).copied().unwrap_or(0)
        }
    }

    impl AnalysisBackend for Scripted {
        fn analyze<'a>(
            &'a self,
            text: &'a str,
            _template: PromptTemplate,
        ) -> BoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let title = title_of(text);
                *self.calls.lock().entry(title.clone()).or_default() += 1;
                let next_failure = {
                    let mut failures = self.failures.lock();
                    failures.get_mut(&title).and_then(|queue| {
                        if queue.is_empty() {
                            None
                        } else {
                            Some(queue.remove(0))
                        }
                    })
                };
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                match next_failure {
                    Some(err) => Err(err),
                    None => Ok(OK_RESPONSE.to_string()),
                }
            })
        }
    }

    fn transient(n: usize) -> Vec<AnalysisError> {
        (0..n)
            .map(|_| AnalysisError::Transient("429".into()))
            .collect()
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_the_limit() {
        let backend = Arc::new(Scripted {
            delay: Duration::from_millis(5),
            ..Scripted::default()
        });
        let engine = AnalysisEngine::new(backend.clone(), settings(4));
        let batch = size_batch(items(30), BatchBounds::unbounded());
        let slots = engine
            .run(batch, PromptTemplate::NewsDigest, &ProgressTracker::new())
            .await;

        assert_eq!(slots.len(), 30);
        assert!(slots.iter().all(|s| s.result().is_some()));
        let peak = backend.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak concurrency was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn results_are_keyed_by_input_position() {
        let backend = Arc::new(Scripted::default().fail("story 00", transient(2)));
        let engine = AnalysisEngine::new(backend, settings(3));
        let batch = size_batch(items(8), BatchBounds::new(Some(10), None));
        let slots = engine
            .run(batch, PromptTemplate::NewsDigest, &ProgressTracker::new())
            .await;

        assert_eq!(slots.len(), 10);
        for (i, slot) in slots.iter().take(8).enumerate() {
            let (candidate, _) = slot.result().unwrap();
            assert_eq!(candidate.sequence, i);
        }
        assert!(slots[8..].iter().all(|s| matches!(s, Slot::Placeholder)));
    }

    #[tokio::test]
    async fn placeholders_never_reach_the_backend() {
        let backend = Arc::new(Scripted::default());
        let engine = AnalysisEngine::new(backend.clone(), settings(2));
        let batch = size_batch(items(2), BatchBounds::new(Some(5), None));
        let tracker = ProgressTracker::new();
        engine.run(batch, PromptTemplate::NewsDigest, &tracker).await;

        assert_eq!(backend.calls.lock().values().sum::<u32>(), 2);
        assert_eq!(tracker.snapshot().total, 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let backend = Arc::new(
            Scripted::default().fail("story 01", vec![AnalysisError::Permanent("401".into())]),
        );
        let engine = AnalysisEngine::new(backend.clone(), settings(2));
        let batch = size_batch(items(3), BatchBounds::unbounded());
        let slots = engine
            .run(batch, PromptTemplate::NewsDigest, &ProgressTracker::new())
            .await;

        assert_eq!(backend.calls_for("story 01"), 1);
        assert!(matches!(slots[1], Slot::Failed { attempts: 1, .. }));
        assert_eq!(slots[1].state(), Some(TaskState::FailedPermanent));
    }

    #[tokio::test]
    async fn transient_failures_stop_after_max_attempts() {
        let backend = Arc::new(Scripted::default().fail("story 00", transient(10)));
        let engine = AnalysisEngine::new(backend.clone(), settings(1));
        let batch = size_batch(items(1), BatchBounds::unbounded());
        let slots = engine
            .run(batch, PromptTemplate::NewsDigest, &ProgressTracker::new())
            .await;

        assert_eq!(backend.calls_for("story 00"), 3);
        assert!(matches!(
            slots[0],
            Slot::Failed {
                attempts: 3,
                state: TaskState::FailedPermanent,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unparseable_responses_are_retried() {
        struct Mute;
        impl AnalysisBackend for Mute {
            fn analyze<'a>(
                &'a self,
                _text: &'a str,
                _template: PromptTemplate,
            ) -> BoxFuture<'a, Result<String, AnalysisError>> {
                Box::pin(async { Ok("I'm sorry, I can't do that.".to_string()) })
            }
        }

        let engine = AnalysisEngine::new(Arc::new(Mute), settings(1));
        let batch = size_batch(items(1), BatchBounds::unbounded());
        let slots = engine
            .run(batch, PromptTemplate::NewsDigest, &ProgressTracker::new())
            .await;
        assert!(matches!(slots[0], Slot::Failed { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn retry_then_success_and_one_exhaustion_in_a_batch_of_25() {
        let backend = Arc::new(
            Scripted::default()
                .fail("story 07", transient(2))
                .fail("story 19", transient(3)),
        );
        let engine = AnalysisEngine::new(backend.clone(), settings(10));
        let tracker = ProgressTracker::new();
        let batch = size_batch(items(25), BatchBounds::unbounded());
        let slots = engine.run(batch, PromptTemplate::NewsDigest, &tracker).await;

        assert!(matches!(slots[7], Slot::Analyzed { attempts: 3, .. }));
        assert!(slots[7].was_retried());
        assert!(matches!(slots[19], Slot::Failed { attempts: 3, .. }));
        assert_eq!(slots[19].state(), Some(TaskState::FailedPermanent));
        assert_eq!(backend.calls_for("story 07"), 3);
        let terminal = slots.iter().filter_map(Slot::state).filter(TaskState::is_terminal).count();
        assert_eq!(terminal, 25);

        let snapshot = tracker.snapshot();
        assert_eq!(
            (snapshot.total, snapshot.completed, snapshot.succeeded, snapshot.failed),
            (25, 25, 24, 1)
        );
    }

    #[tokio::test]
    async fn slow_progress_transport_does_not_hold_up_analysis() {
        struct Sluggish;
        impl ProgressTransport for Sluggish {
            fn publish<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(())
                })
            }
        }

        let engine = AnalysisEngine::new(Arc::new(Scripted::default()), settings(4));
        let tracker = ProgressTracker::new();
        let reporter = spawn_reporter(tracker.subscribe(), Arc::new(Sluggish), Duration::ZERO);
        let batch = size_batch(items(20), BatchBounds::unbounded());

        let slots = tokio::time::timeout(
            Duration::from_secs(5),
            engine.run(batch, PromptTemplate::NewsDigest, &tracker),
        )
        .await
        .expect("analysis finished while the transport was stuck");

        assert_eq!(slots.len(), 20);
        assert_eq!(tracker.snapshot().completed, 20);
        reporter.abort();
    }

    #[tokio::test]
    async fn cancelled_run_releases_every_slot() {
        /// Counts live calls; a dropped call still decrements.
        struct Live<'a>(&'a AtomicUsize);
        impl Drop for Live<'_> {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        #[derive(Default)]
        struct Stuck {
            hang: AtomicBool,
            live: AtomicUsize,
        }

        impl AnalysisBackend for Stuck {
            fn analyze<'a>(
                &'a self,
                _text: &'a str,
                _template: PromptTemplate,
            ) -> BoxFuture<'a, Result<String, AnalysisError>> {
                Box::pin(async move {
                    self.live.fetch_add(1, Ordering::SeqCst);
                    let _live = Live(&self.live);
                    if self.hang.load(Ordering::SeqCst) {
                        futures::future::pending::<()>().await;
                    }
                    Ok(OK_RESPONSE.to_string())
                })
            }
        }

        let backend = Arc::new(Stuck::default());
        backend.hang.store(true, Ordering::SeqCst);
        let engine = AnalysisEngine::new(backend.clone(), settings(2));

        let first = tokio::time::timeout(
            Duration::from_millis(50),
            engine.run(
                size_batch(items(6), BatchBounds::unbounded()),
                PromptTemplate::NewsDigest,
                &ProgressTracker::new(),
            ),
        )
        .await;
        assert!(first.is_err());
        assert_eq!(backend.live.load(Ordering::SeqCst), 0);

        backend.hang.store(false, Ordering::SeqCst);
        let slots = tokio::time::timeout(
            Duration::from_secs(5),
            engine.run(
                size_batch(items(6), BatchBounds::unbounded()),
                PromptTemplate::NewsDigest,
                &ProgressTracker::new(),
            ),
        )
        .await
        .expect("second run completes on the same engine");
        assert!(slots.iter().all(|s| s.result().is_some()));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn huge_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(u64::MAX / 2),
            max_jitter: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(5), Duration::MAX);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(50),
        };
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
