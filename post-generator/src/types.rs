use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A normalized feed item, ready for generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub link: String,
    /// RFC 3339 timestamp, or the collection time when the feed had none.
    pub published: String,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Where a post ended up after publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Remote { path: String },
    Local { path: PathBuf },
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub new: usize,
    pub attempted: usize,
    pub generated: usize,
    pub skipped_generation: usize,
    pub failed_format: usize,
    pub failed_publish: usize,
    pub published_remote: usize,
    pub published_local: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("{0} not set")]
    MissingCredential(&'static str),

    #[error("Invalid repository identifier '{0}', expected owner/name")]
    InvalidRepository(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unexpected response (HTTP {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
