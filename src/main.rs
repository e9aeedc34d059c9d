mod ai;
mod app;
mod collectors;
mod config;
mod domain;
mod error;
mod infrastructure;
mod pipeline;
mod report;
mod tasks;
mod telegram;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths.logs_dir)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::NewsAgentApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
