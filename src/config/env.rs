use std::time::Duration;

use thiserror::Error;

use crate::pipeline::sizer::BatchBounds;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub admin_group_id: Option<i64>,
    pub analysis: AnalysisConfig,
    pub pipeline: PipelineConfig,
    pub collection: CollectionConfig,
    pub catalog_path: Option<String>,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
    pub scheduler: SchedulerConfig,
    pub web: WebContentConfig,
    pub max_document_bytes: u32,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub retry_attempts: u32,
    pub backoff_base: Duration,
    pub news_bounds: BatchBounds,
    pub document_bounds: BatchBounds,
    pub min_word_count: usize,
    pub irrelevant_tolerance: usize,
    /// Critical topics that admit an item on their own.
    pub critical_alone: usize,
    /// Critical + secondary topics that admit an item together.
    pub critical_in_combo: usize,
    pub secondary_in_combo: usize,
    pub dedup_threshold: f64,
    pub progress_throttle: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            retry_attempts: 3,
            backoff_base: Duration::from_secs(2),
            news_bounds: BatchBounds::new(Some(50), Some(60)),
            document_bounds: BatchBounds::unbounded(),
            min_word_count: 100,
            irrelevant_tolerance: 0,
            critical_alone: 2,
            critical_in_combo: 1,
            secondary_in_combo: 2,
            dedup_threshold: 0.8,
            progress_throttle: Duration::from_millis(1_500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub feed_item_limit: usize,
    pub body_fetch_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cron_specs: Vec<String>,
    pub chat_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct WebContentConfig {
    pub fetch_timeout: Duration,
    pub content_max_length: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
