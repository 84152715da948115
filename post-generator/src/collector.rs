use crate::parser::entries_to_articles;
use crate::traits::FeedSource;
use crate::types::Article;
use tracing::{error, info};

/// Walks the configured feed list and gathers a bounded number of articles
/// from each. A feed that fails is logged and skipped for this run.
pub struct FeedCollector {
    source: Box<dyn FeedSource>,
    entries_per_feed: usize,
    description_limit: usize,
}

impl FeedCollector {
    pub fn new(source: Box<dyn FeedSource>) -> Self {
        Self {
            source,
            entries_per_feed: 5,
            description_limit: 500,
        }
    }

    pub fn with_entries_per_feed(mut self, entries_per_feed: usize) -> Self {
        self.entries_per_feed = entries_per_feed;
        self
    }

    pub fn with_description_limit(mut self, description_limit: usize) -> Self {
        self.description_limit = description_limit;
        self
    }

    pub async fn collect(&self, feeds: &[String]) -> Vec<Article> {
        let mut articles = Vec::new();

        for feed_url in feeds {
            info!("Fetching {}", feed_url);

            match self.source.fetch(feed_url).await {
                Ok(feed) => {
                    let batch = entries_to_articles(
                        &feed,
                        feed_url,
                        self.entries_per_feed,
                        self.description_limit,
                    );
                    info!("Collected {} articles from {}", batch.len(), feed_url);
                    articles.extend(batch);
                }
                Err(e) => {
                    error!("Error fetching {}: {}", feed_url, e);
                }
            }
        }

        articles
    }
}
