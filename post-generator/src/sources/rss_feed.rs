use crate::config::FetchConfig;
use crate::traits::FeedSource;
use crate::types::{ParsedFeed, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::info;

/// Feed source backed by HTTP, reading RSS/Atom over the network.
pub struct HttpFeedSource {
    fetcher: Fetcher,
    parser: FeedParser,
}

impl HttpFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let content = self.fetcher.fetch_feed(url).await?;
        let parsed = self.parser.parse_feed(&content)?;

        info!(
            "Parsed {} entries from {} ({})",
            parsed.entries.len(),
            url,
            parsed.title.as_deref().unwrap_or("untitled")
        );
        Ok(parsed)
    }
}
