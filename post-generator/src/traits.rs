use crate::types::{Destination, ParsedFeed, Result};
use async_trait::async_trait;
use std::collections::HashSet;

/// Something that can turn a feed URL into parsed entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

/// Persistence for the set of already processed fingerprints.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Load the persisted set. A store that was never written yields an empty set.
    async fn load(&self) -> Result<HashSet<String>>;

    /// Replace the persisted set with `seen`.
    async fn save(&self, seen: &HashSet<String>) -> Result<()>;
}

/// Destination for finished posts.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn publisher_name(&self) -> String;

    /// Publish `content` under `filename`. `title` is used for commit messages.
    async fn publish(&self, filename: &str, content: &str, title: &str) -> Result<Destination>;
}
