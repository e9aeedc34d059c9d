pub mod handler;
pub mod progress;
pub mod types;
pub mod utils;

pub use handler::TelegramService;
pub use progress::TelegramProgress;
