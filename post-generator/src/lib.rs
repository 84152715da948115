pub mod types;
pub mod config;
pub mod utils;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod collector;
pub mod dedup;
pub mod llm_adapter;
pub mod formatter;
pub mod publisher;
pub mod pipeline;

pub use types::*;
pub use config::Config;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use collector::FeedCollector;
pub use dedup::{fingerprint, filter_new, JsonFileStore, MemoryStore};
pub use llm_adapter::{AnthropicAdapter, LlmAdapter, MockLlmAdapter};
pub use formatter::{extract_tags, slugify, DocumentFormatter, GeneratedDocument};
pub use publisher::{FallbackPublisher, GitHubPublisher, LocalPublisher};
pub use pipeline::Pipeline;
pub use traits::{FeedSource, Publisher, SeenStore};
