use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};
use tokio::task::JoinHandle;

use crate::{
    collectors::document,
    config::AppConfig,
    domain::{DigestRequest, Phase, RequestKind},
    error::RunError,
    infrastructure::shutdown::ShutdownListener,
    pipeline::{spawn_reporter, Digest, DigestKind, Pipeline, ProgressTracker},
    report,
    tasks::queue::RequestQueue,
    telegram::{types::CurrentRun, TelegramProgress},
};

/// Takes digest requests off the queue and runs them one at a time.
pub struct DigestProcessor {
    queue: Arc<RequestQueue<DigestRequest>>,
    bot: Bot,
    pipeline: Arc<Pipeline>,
    config: Arc<AppConfig>,
    reports_dir: PathBuf,
    current: CurrentRun,
}

impl DigestProcessor {
    pub fn new(
        queue: Arc<RequestQueue<DigestRequest>>,
        bot: Bot,
        pipeline: Arc<Pipeline>,
        config: Arc<AppConfig>,
        reports_dir: PathBuf,
        current: CurrentRun,
    ) -> Self {
        Self {
            queue,
            bot,
            pipeline,
            config,
            reports_dir,
            current,
        }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(&mut shutdown).await;
        })
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let Some(request) = self.queue.pop() else {
                if shutdown.run_until(self.queue.notified()).await.is_none() {
                    break;
                }
                continue;
            };

            let label = request.label().to_string();
            let chat_id = request.chat_id;
            *self.current.lock() = Some(label.clone());
            let outcome = shutdown.run_until(self.handle(request)).await;
            *self.current.lock() = None;

            match outcome {
                None => {
                    tracing::info!(
                        target: "processor",
                        request = %label,
                        "shutdown requested; run cancelled"
                    );
                    break;
                }
                Some(Err(err)) => {
                    tracing::error!(
                        target: "processor",
                        request = %label,
                        chat_id = chat_id.0,
                        error = %err,
                        "failed to deliver digest"
                    );
                }
                Some(Ok(())) => {}
            }
        }
        tracing::info!(target: "processor", "digest processor stopped");
    }

    async fn handle(&self, request: DigestRequest) -> Result<()> {
        let chat_id = request.chat_id;
        tracing::info!(
            target: "processor",
            chat_id = chat_id.0,
            request = request.label(),
            origin = ?request.origin,
            requested_by = ?request.requested_by,
            waited_ms = (chrono::Utc::now() - request.requested_at).num_milliseconds(),
            "run started"
        );

        let tracker = ProgressTracker::new();
        let reporter = spawn_reporter(
            tracker.subscribe(),
            Arc::new(TelegramProgress::new(self.bot.clone(), chat_id)),
            self.config.pipeline.progress_throttle,
        );

        let result = self.execute(request.kind, &tracker).await;
        if result.is_ok() {
            tracker.set_phase(Phase::Done);
        }
        drop(tracker);
        if let Err(err) = reporter.await {
            tracing::warn!(target: "processor", error = %err, "progress reporter failed");
        }

        match result {
            Ok(digest) => self.deliver(chat_id, &digest).await,
            Err(err) => {
                tracing::warn!(target: "processor", chat_id = chat_id.0, error = %err, "run failed");
                self.bot.send_message(chat_id, err.user_message()).await?;
                Ok(())
            }
        }
    }

    async fn execute(&self, kind: RequestKind, tracker: &ProgressTracker) -> Result<Digest, RunError> {
        match kind {
            RequestKind::DailyNews => self.pipeline.run_news(tracker).await,
            RequestKind::Document { file_name, bytes } => {
                let text = document::extract_text(&file_name, bytes).await?;
                self.pipeline.run_document(&file_name, &text, tracker).await
            }
        }
    }

    async fn deliver(&self, chat_id: ChatId, digest: &Digest) -> Result<()> {
        let tz: Tz = self
            .config
            .timezone
            .parse()
            .unwrap_or(chrono_tz::Asia::Kolkata);

        if digest.kind == DigestKind::News {
            self.bot
                .send_message(chat_id, report::format_source_summary(digest))
                .parse_mode(ParseMode::Html)
                .await
                .context("sending source summary")?;
        }

        let summary = digest.summary.render_text();
        if digest.summary.kept == 0 {
            self.bot
                .send_message(
                    chat_id,
                    format!("ℹ️ Nothing UPSC-relevant made it through this time.\n\n{summary}"),
                )
                .await?;
            return Ok(());
        }

        let markdown = report::render(digest, tz);
        let file_name = report::file_name(digest, tz);
        self.archive(&file_name, &markdown).await;

        self.bot
            .send_message(chat_id, format!("✅ Analysis complete! Sending your digest...\n\n{summary}"))
            .await?;
        self.bot
            .send_document(chat_id, InputFile::memory(markdown.into_bytes()).file_name(file_name))
            .await
            .context("sending digest document")?;
        tracing::info!(
            target: "processor",
            chat_id = chat_id.0,
            kept = digest.summary.kept,
            "digest delivered"
        );
        Ok(())
    }

    async fn archive(&self, file_name: &str, markdown: &str) {
        let path = self.reports_dir.join(file_name);
        let write = tokio::fs::write(&path, markdown);
        match tokio::time::timeout(Duration::from_secs(5), write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(target: "processor", path = %path.display(), error = %err, "failed to archive digest");
            }
            Err(_) => {
                tracing::warn!(target: "processor", path = %path.display(), "archiving digest timed out");
            }
        }
    }
}
