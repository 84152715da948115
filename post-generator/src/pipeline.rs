use crate::collector::FeedCollector;
use crate::config::Config;
use crate::dedup::{article_fingerprint, filter_new, JsonFileStore};
use crate::formatter::{post_filename, DocumentFormatter};
use crate::llm_adapter::{AnthropicAdapter, LlmAdapter};
use crate::publisher::FallbackPublisher;
use crate::sources::HttpFeedSource;
use crate::traits::{Publisher, SeenStore};
use crate::types::{Article, Destination, Result, RunSummary};
use crate::utils::text;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// One pass of the post generator: load seen-set, collect feeds, deduplicate,
/// then generate, format and publish a bounded batch, strictly in order.
pub struct Pipeline {
    feeds: Vec<String>,
    collector: FeedCollector,
    store: Box<dyn SeenStore>,
    generator: Box<dyn LlmAdapter>,
    formatter: DocumentFormatter,
    publisher: Box<dyn Publisher>,
    batch_cap: usize,
    mark_seen_after_publish: bool,
}

impl Pipeline {
    pub fn new(
        feeds: Vec<String>,
        collector: FeedCollector,
        store: Box<dyn SeenStore>,
        generator: Box<dyn LlmAdapter>,
        formatter: DocumentFormatter,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            feeds,
            collector,
            store,
            generator,
            formatter,
            publisher,
            batch_cap: 3,
            mark_seen_after_publish: false,
        }
    }

    /// Wire the production components from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let collector = FeedCollector::new(Box::new(HttpFeedSource::new(config.fetch.clone())?))
            .with_entries_per_feed(config.entries_per_feed)
            .with_description_limit(config.description_limit);

        if config.generation.api_key.is_none() {
            warn!("ANTHROPIC_API_KEY not set, every generation attempt will be skipped");
        }

        let pipeline = Self::new(
            config.feeds.clone(),
            collector,
            Box::new(JsonFileStore::new(&config.seen_path)),
            Box::new(AnthropicAdapter::new(config.generation.clone())?),
            DocumentFormatter::new(config.document.clone()),
            Box::new(FallbackPublisher::from_config(
                config.publish.clone(),
                &config.content_dir,
            )),
        )
        .with_batch_cap(config.batch_cap)
        .with_mark_seen_after_publish(config.mark_seen_after_publish);

        Ok(pipeline)
    }

    pub fn with_batch_cap(mut self, batch_cap: usize) -> Self {
        self.batch_cap = batch_cap;
        self
    }

    pub fn with_mark_seen_after_publish(mut self, enabled: bool) -> Self {
        self.mark_seen_after_publish = enabled;
        self
    }

    /// Run once. Only a seen-set that exists but cannot be read aborts the
    /// run; every other failure is confined to its feed or article.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let mut seen = self.store.load().await?;
        info!("Loaded {} previously seen articles", seen.len());

        info!("Fetching {} feeds", self.feeds.len());
        let articles = self.collector.collect(&self.feeds).await;
        summary.fetched = articles.len();
        info!("Found {} articles", articles.len());

        let new_articles = if self.mark_seen_after_publish {
            let mut admitted = seen.clone();
            filter_new(articles, &mut admitted)
        } else {
            let fresh = filter_new(articles, &mut seen);
            // Persist before generating so admitted articles stay seen even
            // if the process dies mid-batch.
            self.save_seen(&seen).await;
            fresh
        };
        summary.new = new_articles.len();
        info!("{} new articles to process", new_articles.len());

        for article in new_articles.iter().take(self.batch_cap) {
            summary.attempted += 1;
            info!("Processing: {}", text::truncate_chars(&article.title, 60));

            let Some(destination) = self.process_article(article, &mut summary).await else {
                continue;
            };

            summary.generated += 1;
            match destination {
                Destination::Remote { .. } => summary.published_remote += 1,
                Destination::Local { .. } => summary.published_local += 1,
            }

            if self.mark_seen_after_publish {
                seen.insert(article_fingerprint(article));
                self.save_seen(&seen).await;
            }
        }

        info!("Generated {} posts", summary.generated);
        Ok(summary)
    }

    async fn process_article(&self, article: &Article, summary: &mut RunSummary) -> Option<Destination> {
        let content = match self.generator.generate_post(article).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping due to generation error: {}", e);
                summary.skipped_generation += 1;
                return None;
            }
        };

        let document = match self.formatter.create_document(article, &content) {
            Ok(document) => document,
            Err(e) => {
                error!("Skipping '{}': {}", article.title, e);
                summary.failed_format += 1;
                return None;
            }
        };

        let filename = post_filename(&article.title);
        match self
            .publisher
            .publish(&filename, &document.render(), &article.title)
            .await
        {
            Ok(destination) => Some(destination),
            Err(e) => {
                error!("Failed to publish {}: {}", filename, e);
                summary.failed_publish += 1;
                None
            }
        }
    }

    async fn save_seen(&self, seen: &HashSet<String>) {
        if let Err(e) = self.store.save(seen).await {
            error!("Failed to save seen articles: {}", e);
        }
    }
}
