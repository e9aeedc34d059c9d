pub mod client;
pub mod inference;
pub mod prompts;

pub use client::NvidiaClient;
pub use prompts::PromptTemplate;
