use async_trait::async_trait;
use post_generator::dedup::fingerprint;
use post_generator::{
    Destination, DocumentFormatter, FallbackPublisher, FeedCollector, FeedSource, GeneratorError,
    LocalPublisher, MemoryStore, MockLlmAdapter, ParsedEntry, ParsedFeed, Pipeline, Publisher,
    Result, RunSummary,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

fn entry(title: &str, link: &str) -> ParsedEntry {
    ParsedEntry {
        title: title.to_string(),
        link: link.to_string(),
        description: Some(format!("Summary of {}", title)),
        published_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()),
    }
}

fn feed(title: &str, entries: Vec<ParsedEntry>) -> ParsedFeed {
    ParsedFeed {
        title: Some(title.to_string()),
        entries,
    }
}

fn five_story_feed() -> ParsedFeed {
    feed(
        "Crypto Wire",
        vec![
            entry("Bitcoin climbs past resistance", "https://wire.example.com/1"),
            entry("Ethereum DeFi Regulation Update", "https://wire.example.com/2"),
            entry("Solana validators upgrade", "https://wire.example.com/3"),
            entry("NFT market cools", "https://wire.example.com/4"),
            entry("Kraken lists new token", "https://wire.example.com/5"),
        ],
    )
}

/// Feed source serving canned feeds; unknown URLs fail like a dead host.
struct StaticFeedSource {
    feeds: HashMap<String, ParsedFeed>,
}

impl StaticFeedSource {
    fn new(feeds: Vec<(&str, ParsedFeed)>) -> Self {
        Self {
            feeds: feeds.into_iter().map(|(url, f)| (url.to_string(), f)).collect(),
        }
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| GeneratorError::General(format!("connection refused: {}", url)))
    }
}

/// Remote publisher that rejects one title and records the rest.
#[derive(Clone, Default)]
struct FlakyRemote {
    reject_title: String,
    committed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Publisher for FlakyRemote {
    fn publisher_name(&self) -> String {
        "flaky remote".to_string()
    }

    async fn publish(&self, filename: &str, _content: &str, title: &str) -> Result<Destination> {
        if title == self.reject_title {
            return Err(GeneratorError::UnexpectedResponse {
                status: 401,
                body: "Bad credentials".to_string(),
            });
        }
        self.committed.lock().unwrap().push(filename.to_string());
        Ok(Destination::Remote {
            path: format!("content/posts/{}", filename),
        })
    }
}

fn pipeline(
    feeds: Vec<(&str, ParsedFeed)>,
    store: MemoryStore,
    generator: MockLlmAdapter,
    publisher: Box<dyn Publisher>,
) -> Pipeline {
    let urls = feeds.iter().map(|(url, _)| url.to_string()).collect();
    let collector = FeedCollector::new(Box::new(StaticFeedSource::new(feeds)));
    Pipeline::new(
        urls,
        collector,
        Box::new(store),
        Box::new(generator),
        DocumentFormatter::default(),
        publisher,
    )
}

fn markdown_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_run_without_publish_token_saves_batch_locally() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let generator = MockLlmAdapter::new("test".to_string());

    let pipeline = pipeline(
        vec![("https://wire.example.com/rss", five_story_feed())],
        store.clone(),
        generator.clone(),
        Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
    );

    let summary = pipeline.run().await.unwrap();
    info!("Run summary: {:?}", summary);

    assert_eq!(summary.fetched, 5);
    assert_eq!(summary.new, 5);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.published_local, 3);
    assert_eq!(generator.call_count(), 3);

    assert_eq!(
        markdown_files(content_dir.path()),
        vec![
            "bitcoin-climbs-past-resistance.md",
            "ethereum-defi-regulation-update.md",
            "solana-validators-upgrade.md",
        ]
    );

    // Persisted before generation, so all five are marked seen.
    let seen = store.snapshot().await;
    assert_eq!(seen.len(), 5);
    for entry in five_story_feed().entries {
        assert!(seen.contains(&fingerprint(&entry.title, &entry.link)));
    }

    let post = std::fs::read_to_string(content_dir.path().join("ethereum-defi-regulation-update.md")).unwrap();
    assert!(post.starts_with("+++\ndate = '2024-06-01T09:00:00+00:00'\n"));
    assert!(post.contains("*Source: Crypto Wire*"));
    assert!(post.contains("*Original: [Ethereum DeFi Regulation Update](https://wire.example.com/2)*"));
}

#[tokio::test]
async fn test_second_run_skips_seen_articles() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    for expected_new in [5, 0] {
        let pipeline = pipeline(
            vec![("https://wire.example.com/rss", five_story_feed())],
            store.clone(),
            MockLlmAdapter::new("test".to_string()),
            Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
        );
        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.new, expected_new);
    }

    assert_eq!(markdown_files(content_dir.path()).len(), 3);
}

#[tokio::test]
async fn test_duplicate_across_feeds_survives_once() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let shared = entry("Binance expands derivatives desk", "https://shared.example.com/x");

    let pipeline = pipeline(
        vec![
            ("https://one.example.com/rss", feed("Feed One", vec![shared.clone()])),
            ("https://two.example.com/rss", feed("Feed Two", vec![shared])),
        ],
        MemoryStore::new(),
        MockLlmAdapter::new("test".to_string()),
        Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
    );

    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.new, 1);
    assert_eq!(summary.generated, 1);
    let post = std::fs::read_to_string(content_dir.path().join("binance-expands-derivatives-desk.md")).unwrap();
    assert!(post.contains("*Source: Feed One*"));
}

#[tokio::test]
async fn test_generation_failure_does_not_stop_batch() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let generator = MockLlmAdapter::new("test".to_string()).failing_on("Bitcoin climbs past resistance");

    let pipeline = pipeline(
        vec![("https://wire.example.com/rss", five_story_feed())],
        MemoryStore::new(),
        generator.clone(),
        Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
    );

    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.skipped_generation, 1);
    assert_eq!(summary.generated, 2);
    assert_eq!(generator.call_count(), 3);
    assert_eq!(
        markdown_files(content_dir.path()),
        vec!["ethereum-defi-regulation-update.md", "solana-validators-upgrade.md"]
    );
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_local() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let remote = FlakyRemote {
        reject_title: "Ethereum DeFi Regulation Update".to_string(),
        ..FlakyRemote::default()
    };
    let publisher = FallbackPublisher::new(
        Some(Box::new(remote.clone())),
        LocalPublisher::new(content_dir.path()),
    );

    let pipeline = pipeline(
        vec![("https://wire.example.com/rss", five_story_feed())],
        MemoryStore::new(),
        MockLlmAdapter::new("test".to_string()),
        Box::new(publisher),
    );

    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.generated, 3);
    assert_eq!(summary.published_remote, 2);
    assert_eq!(summary.published_local, 1);
    assert_eq!(
        *remote.committed.lock().unwrap(),
        vec!["bitcoin-climbs-past-resistance.md", "solana-validators-upgrade.md"]
    );
    assert_eq!(
        markdown_files(content_dir.path()),
        vec!["ethereum-defi-regulation-update.md"]
    );
}

#[tokio::test]
async fn test_mark_seen_after_publish_retries_failed_articles() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let failing = "Solana validators upgrade";

    let pipeline = pipeline(
        vec![("https://wire.example.com/rss", five_story_feed())],
        store.clone(),
        MockLlmAdapter::new("test".to_string()).failing_on(failing),
        Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
    )
    .with_mark_seen_after_publish(true);

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.generated, 2);

    let seen = store.snapshot().await;
    assert_eq!(seen.len(), 2);
    assert!(!seen.contains(&fingerprint(failing, "https://wire.example.com/3")));

    // Next run picks the failed article up again.
    let retry = pipeline.run().await.unwrap();
    assert_eq!(retry.new, 3);
}

#[tokio::test]
async fn test_all_feeds_failing_still_completes() {
    init_tracing();

    let content_dir = tempfile::tempdir().unwrap();
    let collector = FeedCollector::new(Box::new(StaticFeedSource::new(vec![])));
    let pipeline = Pipeline::new(
        vec!["https://down.example.com/rss".to_string()],
        collector,
        Box::new(MemoryStore::new()),
        Box::new(MockLlmAdapter::new("test".to_string())),
        DocumentFormatter::default(),
        Box::new(FallbackPublisher::local_only(LocalPublisher::new(content_dir.path()))),
    );

    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary, RunSummary::default());
    assert!(markdown_files(content_dir.path()).is_empty());
}
