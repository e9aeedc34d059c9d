pub mod catalog;
pub mod env;
mod loader;

pub use catalog::{Catalog, FeedSource};
pub use env::{AnalysisConfig, AppConfig, DirectoryConfig, PipelineConfig, WebContentConfig};
pub use loader::load_config;
