use std::{io, path::Path};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::env::LoggingConfig;

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Crates whose info-level output drowns out the pipeline's own logs.
const QUIET_CRATES: &[&str] = &["hyper_util", "reqwest", "html5ever", "selectors", "lopdf"];

/// Filter directives for `level`, with chatty dependencies held at `warn`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.trim().to_string()];
    directives.extend(QUIET_CRATES.iter().map(|name| format!("{name}=warn")));
    directives.join(",")
}

/// Console plus daily-rolling `agent.log` in `logs_dir`. `RUST_LOG` wins over
/// the configured level. Safe to call more than once.
pub fn init_tracing(logging: &LoggingConfig, logs_dir: &Path) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter_directives(&logging.level)))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let file_appender = tracing_appender::rolling::daily(logs_dir, "agent.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            target: "app",
            logs = %logs_dir.display(),
            level = %logging.level,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}
