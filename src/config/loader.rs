use std::{env, str::FromStr, time::Duration};

use super::env::{
    AnalysisConfig, AppConfig, CollectionConfig, ConfigError, DirectoryConfig, LoggingConfig,
    PipelineConfig, SchedulerConfig, WebContentConfig,
};
use crate::pipeline::sizer::BatchBounds;

const DEFAULT_API_URL: &str = "https://integrate.api.nvidia.com/v1/chat/completions";
const MAX_BACKOFF_SECONDS: f64 = 300.0;

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let admin_group_id = parse_num::<i64>("ADMIN_GROUP_ID")
            .map(|id| if id > 0 { -id } else { id });

        let analysis = AnalysisConfig {
            api_key: required("NVIDIA_API_KEY")?,
            model: required("NVIDIA_MODEL")?,
            api_url: env::var("NVIDIA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            request_timeout: Duration::from_secs(
                parse_num::<u64>("ANALYSIS_TIMEOUT_SECS").unwrap_or(90),
            ),
        };

        let pipeline = pipeline_from_env()?;

        let collection = CollectionConfig {
            feed_item_limit: parse_num::<usize>("FEED_ITEM_LIMIT").unwrap_or(15),
            body_fetch_concurrency: parse_num::<usize>("BODY_FETCH_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(8),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone = env::var("BOT_TIMEZONE").unwrap_or_else(|_| "Asia/Kolkata".to_string());

        let scheduler = SchedulerConfig {
            cron_specs: env::var("DIGEST_CRONS")
                .map(|value| {
                    value
                        .split(';')
                        .map(|part| part.trim().to_string())
                        .filter(|part| !part.is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            chat_ids: env::var("DIGEST_CHAT_IDS")
                .ok()
                .map(|value| {
                    value
                        .split(',')
                        .filter_map(|part| part.trim().parse::<i64>().ok())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        };

        let web = WebContentConfig {
            fetch_timeout: Duration::from_millis(
                parse_num::<u64>("WEBPAGE_FETCH_TIMEOUT").unwrap_or(10_000),
            ),
            content_max_length: parse_num::<usize>("WEBPAGE_CONTENT_MAX_LENGTH").unwrap_or(6_000),
        };

        Ok(Self {
            telegram_bot_token,
            admin_group_id,
            analysis,
            pipeline,
            collection,
            catalog_path: env::var("CATALOG_PATH").ok().filter(|v| !v.is_empty()),
            directories,
            logging,
            timezone,
            scheduler,
            web,
            max_document_bytes: parse_num::<u32>("MAX_DOCUMENT_BYTES").unwrap_or(20 * 1024 * 1024),
        })
    }
}

fn pipeline_from_env() -> Result<PipelineConfig, ConfigError> {
    let defaults = PipelineConfig::default();
    let config = PipelineConfig {
        max_concurrency: parse_num("MAX_CONCURRENCY").unwrap_or(defaults.max_concurrency),
        retry_attempts: parse_num("RETRY_ATTEMPTS").unwrap_or(defaults.retry_attempts),
        backoff_base: backoff_from(
            parse_num::<f64>("BACKOFF_BASE_SECONDS"),
            defaults.backoff_base,
        ),
        news_bounds: BatchBounds::new(
            bound_from(env::var("NEWS_MIN_BATCH").ok(), defaults.news_bounds.min),
            bound_from(env::var("NEWS_MAX_BATCH").ok(), defaults.news_bounds.max),
        ),
        document_bounds: BatchBounds::new(
            bound_from(env::var("DOC_MIN_BATCH").ok(), defaults.document_bounds.min),
            bound_from(env::var("DOC_MAX_BATCH").ok(), defaults.document_bounds.max),
        ),
        min_word_count: parse_num("MIN_WORD_COUNT").unwrap_or(defaults.min_word_count),
        irrelevant_tolerance: parse_num("IRRELEVANT_TOLERANCE")
            .unwrap_or(defaults.irrelevant_tolerance),
        critical_alone: parse_num("CRITICAL_ALONE").unwrap_or(defaults.critical_alone),
        critical_in_combo: parse_num("CRITICAL_IN_COMBO").unwrap_or(defaults.critical_in_combo),
        secondary_in_combo: parse_num("SECONDARY_IN_COMBO")
            .unwrap_or(defaults.secondary_in_combo),
        dedup_threshold: parse_num("DEDUP_SIMILARITY_THRESHOLD")
            .unwrap_or(defaults.dedup_threshold),
        progress_throttle: parse_num::<u64>("PROGRESS_THROTTLE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.progress_throttle),
    };
    validate_pipeline(&config)?;
    Ok(config)
}

pub fn validate_pipeline(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_concurrency == 0 {
        return Err(ConfigError::Invalid {
            key: "MAX_CONCURRENCY",
            reason: "must be at least 1".into(),
        });
    }
    if config.retry_attempts == 0 {
        return Err(ConfigError::Invalid {
            key: "RETRY_ATTEMPTS",
            reason: "must be at least 1".into(),
        });
    }
    for (key, value) in [
        ("CRITICAL_ALONE", config.critical_alone),
        ("CRITICAL_IN_COMBO", config.critical_in_combo),
        ("SECONDARY_IN_COMBO", config.secondary_in_combo),
    ] {
        if value == 0 {
            return Err(ConfigError::Invalid {
                key,
                reason: "must be at least 1".into(),
            });
        }
    }
    if !(config.dedup_threshold > 0.0 && config.dedup_threshold <= 1.0) {
        return Err(ConfigError::Invalid {
            key: "DEDUP_SIMILARITY_THRESHOLD",
            reason: format!("{} is outside (0, 1]", config.dedup_threshold),
        });
    }
    for (key, bounds) in [
        ("NEWS_MIN_BATCH", &config.news_bounds),
        ("DOC_MIN_BATCH", &config.document_bounds),
    ] {
        if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
            if min > max {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("minimum {min} exceeds maximum {max}"),
                });
            }
        }
    }
    Ok(())
}

/// Backoff base in seconds, capped so the `Duration` conversion cannot
/// overflow. Negative or non-finite values keep the default.
fn backoff_from(secs: Option<f64>, default: Duration) -> Duration {
    secs.filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_BACKOFF_SECONDS)))
        .unwrap_or(default)
}

/// A batch bound: unset or unparseable keeps `default`; `none`,
/// `unbounded`, `inf` or `∞` lift the bound.
fn bound_from(raw: Option<String>, default: Option<usize>) -> Option<usize> {
    let Some(raw) = raw else {
        return default;
    };
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "none" | "unbounded" | "inf" | "infinity" | "∞" => None,
        _ => value.parse().ok().or(default),
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_num<T: FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_pipeline(&PipelineConfig::default()).is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = PipelineConfig {
            max_concurrency: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            validate_pipeline(&config),
            Err(ConfigError::Invalid {
                key: "MAX_CONCURRENCY",
                ..
            })
        ));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = PipelineConfig {
            news_bounds: BatchBounds::new(Some(60), Some(50)),
            ..PipelineConfig::default()
        };
        assert!(validate_pipeline(&config).is_err());
    }

    #[test]
    fn admission_thresholds_must_be_positive() {
        let config = PipelineConfig {
            critical_in_combo: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            validate_pipeline(&config),
            Err(ConfigError::Invalid {
                key: "CRITICAL_IN_COMBO",
                ..
            })
        ));
    }

    #[test]
    fn huge_backoff_is_capped() {
        let default = Duration::from_secs(2);
        assert_eq!(backoff_from(Some(1e30), default), Duration::from_secs(300));
        assert_eq!(backoff_from(Some(f64::INFINITY), default), default);
        assert_eq!(backoff_from(Some(-1.0), default), default);
        assert_eq!(backoff_from(Some(0.5), default), Duration::from_millis(500));
    }

    #[test]
    fn batch_bounds_can_be_lifted() {
        assert_eq!(bound_from(None, Some(50)), Some(50));
        assert_eq!(bound_from(Some("40".into()), Some(50)), Some(40));
        assert_eq!(bound_from(Some(" Unbounded ".into()), Some(50)), None);
        assert_eq!(bound_from(Some("∞".into()), Some(60)), None);
        assert_eq!(bound_from(Some("lots".into()), Some(60)), Some(60));
    }

    #[test]
    fn threshold_must_be_a_fraction() {
        let config = PipelineConfig {
            dedup_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(validate_pipeline(&config).is_err());
    }
}
