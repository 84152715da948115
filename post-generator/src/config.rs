use crate::types::{GeneratorError, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_FEEDS: &[&str] = &[
    "https://feeds.bloomberg.com/markets/news.rss",
    "https://feed.coindesk.com/idx/feed",
    "https://theblock.co/feed/rss",
    "https://feeds.bloomberg.com/crypto.rss",
    "https://blog.binance.com/en/feed",
];

const USER_AGENT: &str = concat!("post-generator/", env!("CARGO_PKG_VERSION"));

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub feeds: Vec<String>,
    pub entries_per_feed: usize,
    pub description_limit: usize,
    pub batch_cap: usize,
    pub seen_path: PathBuf,
    pub content_dir: PathBuf,
    /// Record a fingerprint only once its post is published, so failed
    /// articles are retried on the next run.
    pub mark_seen_after_publish: bool,
    pub fetch: FetchConfig,
    pub generation: GenerationConfig,
    pub publish: PublishConfig,
    pub document: DocumentConfig,
}

impl Config {
    /// Build a configuration from the process environment, falling back to
    /// defaults for anything unset. Missing credentials are not an error.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.generation.api_key = non_empty_var("ANTHROPIC_API_KEY");
        config.publish.token = non_empty_var("GITHUB_TOKEN");

        if let Some(repo) = non_empty_var("GITHUB_REPO") {
            config.publish.repository = repo;
        }
        if let Some(dir) = non_empty_var("CONTENT_DIR") {
            config.content_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty_var("SEEN_ARTICLES_PATH") {
            config.seen_path = PathBuf::from(path);
        }
        if let Some(feeds) = non_empty_var("FEED_URLS") {
            config.feeds = split_feed_list(&feeds);
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            entries_per_feed: 5,
            description_limit: 500,
            batch_cap: 3,
            seen_path: PathBuf::from(".seen_articles.json"),
            content_dir: PathBuf::from("content").join("posts"),
            mark_seen_after_publish: false,
            fetch: FetchConfig::default(),
            generation: GenerationConfig::default(),
            publish: PublishConfig::default(),
            document: DocumentConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout_seconds: 30,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_version: "2023-06-01".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 2048,
            timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Clone)]
pub struct PublishConfig {
    pub token: Option<String>,
    /// `owner/name` of the target repository.
    pub repository: String,
    pub branch: String,
    pub api_url: String,
    pub path_prefix: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl PublishConfig {
    pub fn owner_and_repo(&self) -> Result<(&str, &str)> {
        match self.repository.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok((owner, repo))
            }
            _ => Err(GeneratorError::InvalidRepository(self.repository.clone())),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            token: None,
            repository: "username/cryptotradeinsights".to_string(),
            branch: "main".to_string(),
            api_url: "https://api.github.com".to_string(),
            path_prefix: "content/posts".to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout_seconds: 10,
        }
    }
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("token", &redacted(&self.token))
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("api_url", &self.api_url)
            .field("path_prefix", &self.path_prefix)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Fixed front matter values for every generated post.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub author: String,
    pub category: String,
    pub draft: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            author: "CryptoTradeInsights".to_string(),
            category: "news".to_string(),
            draft: false,
        }
    }
}

pub fn split_feed_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}
