use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::utils::command::BotCommands;

use crate::{
    config::AppConfig,
    domain::{DigestRequest, QueueSnapshot},
    tasks::queue::RequestQueue,
};

pub type BotResult<T> = Result<T, teloxide::RequestError>;

/// Label of the request the processor is working on, if any.
pub type CurrentRun = Arc<Mutex<Option<String>>>;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<RequestQueue<DigestRequest>>,
    pub current: CurrentRun,
}

impl AppState {
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn current_run(&self) -> Option<String> {
        self.current.lock().clone()
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum GeneralCommand {
    #[command(description = "introduction")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "build today's UPSC news digest")]
    News,
    #[command(description = "queue and processing status")]
    Status,
}
