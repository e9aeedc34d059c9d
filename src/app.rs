use std::{sync::Arc, time::Duration};

use anyhow::Result;
use parking_lot::Mutex;
use reqwest::Client;
use teloxide::prelude::*;
use tokio::{task::JoinHandle, time::timeout};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    ai::NvidiaClient,
    collectors::{Collector, RssCollector, WebContentFetcher},
    config::{AppConfig, Catalog},
    domain::DigestRequest,
    infrastructure::{directories::ResolvedPaths, notifier::notify_admin_group, shutdown::Shutdown},
    pipeline::{AnalysisEngine, EngineSettings, Pipeline, RelevanceClassifier},
    tasks::{processor::DigestProcessor, queue::RequestQueue, scheduler::configure_digest_jobs},
    telegram::{types::CurrentRun, TelegramService},
};

pub struct NewsAgentApp {
    scheduler: JobScheduler,
    processor_handle: JoinHandle<()>,
    telegram: TelegramService,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
    bot: Bot,
}

impl NewsAgentApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);
        tracing::info!(
            target: "app",
            logs = %paths.logs_dir.display(),
            data = %paths.data_dir.display(),
            reports = %paths.reports_dir.display(),
            "directories ready"
        );

        let http_client = Client::builder()
            .user_agent(format!("upsc-news-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let backend = Arc::new(NvidiaClient::new(
            http_client.clone(),
            config.analysis.clone(),
        ));
        let fetcher = Arc::new(WebContentFetcher::new(
            http_client.clone(),
            config.web.clone(),
        ));

        let catalog = Catalog::load(config.catalog_path.as_deref())?;
        let collectors: Vec<Box<dyn Collector>> = catalog
            .feeds
            .iter()
            .cloned()
            .map(|source| {
                Box::new(RssCollector::new(
                    source,
                    http_client.clone(),
                    fetcher.clone(),
                    config.collection.feed_item_limit,
                    config.collection.body_fetch_concurrency,
                )) as Box<dyn Collector>
            })
            .collect();

        let classifier = RelevanceClassifier::from_config(&catalog, &config.pipeline)?;
        let engine = AnalysisEngine::new(
            backend,
            EngineSettings::from_config(&config.pipeline, config.analysis.request_timeout),
        );
        let pipeline = Arc::new(Pipeline::new(
            collectors,
            classifier,
            engine,
            config.pipeline.clone(),
        ));
        tracing::info!(
            target: "app",
            sources = pipeline.source_count(),
            model = %config.analysis.model,
            max_concurrency = config.pipeline.max_concurrency,
            "pipeline ready"
        );

        let bot = Bot::new(&config.telegram_bot_token);
        let queue = Arc::new(RequestQueue::<DigestRequest>::new());
        let current: CurrentRun = Arc::new(Mutex::new(None));

        let telegram = TelegramService::new(
            bot.clone(),
            config.clone(),
            queue.clone(),
            current.clone(),
        );

        let processor = Arc::new(DigestProcessor::new(
            queue.clone(),
            bot.clone(),
            pipeline,
            config.clone(),
            paths.reports_dir.clone(),
            current,
        ));
        let processor_handle = processor.spawn(shutdown.subscribe());

        let scheduler = configure_digest_jobs(
            &config.scheduler.cron_specs,
            &config.scheduler.chat_ids,
            queue,
        )
        .await?;

        Ok(Self {
            scheduler,
            processor_handle,
            telegram,
            shutdown,
            config,
            bot,
        })
    }

    pub async fn run(self) -> Result<()> {
        let NewsAgentApp {
            mut scheduler,
            mut processor_handle,
            telegram,
            shutdown,
            config,
            bot,
        } = self;

        tracing::info!(target: "app", "UPSC news agent starting");
        notify_admin_group(&bot, config.admin_group_id, "UPSC news agent started.").await;

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);
        let mut telegram_future = Box::pin(telegram.run(shutdown.subscribe()));
        let mut telegram_completed = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "app", "shutdown signal received");
            }
            res = &mut telegram_future => {
                telegram_completed = true;
                if let Err(err) = res {
                    tracing::error!(target: "app", ?err, "telegram dispatcher exited with error");
                } else {
                    tracing::info!(target: "app", "telegram dispatcher exited");
                }
            }
        }

        shutdown.trigger();

        if !telegram_completed {
            let wait = tokio::time::sleep(shutdown_timeout);
            tokio::pin!(wait);
            tokio::select! {
                res = &mut telegram_future => {
                    if let Err(err) = res {
                        tracing::error!(target: "app", ?err, "telegram dispatcher exited with error");
                    }
                }
                _ = &mut wait => {
                    tracing::warn!(
                        target: "telegram",
                        "Telegram dispatcher did not stop within {:?}; forcing exit",
                        shutdown_timeout
                    );
                }
            }
        }

        match timeout(shutdown_timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "scheduler", ?err, "scheduler shutdown failed");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    shutdown_timeout
                );
            }
        }

        let processor_sleep = tokio::time::sleep(shutdown_timeout);
        tokio::pin!(processor_sleep);
        tokio::select! {
            res = &mut processor_handle => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "processor", "digest processor panicked");
                    }
                }
            }
            _ = &mut processor_sleep => {
                tracing::warn!(
                    target: "processor",
                    "digest processor did not stop within {:?}; aborting",
                    shutdown_timeout
                );
                processor_handle.abort();
            }
        }

        tracing::info!(target: "app", "UPSC news agent stopped");
        notify_admin_group(&bot, config.admin_group_id, "UPSC news agent stopped.").await;
        Ok(())
    }
}
