//! Fingerprint based deduplication across runs.
//!
//! A fingerprint is the hex SHA-256 of `"{title}:{link}"`. The seen-set only
//! ever grows: fingerprints are added, never removed.

use crate::traits::SeenStore;
use crate::types::{Article, GeneratorError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

pub fn fingerprint(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b":");
    hasher.update(link.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn article_fingerprint(article: &Article) -> String {
    fingerprint(&article.title, &article.link)
}

/// Keep the articles whose fingerprint is not in `seen`, in input order.
///
/// Every kept fingerprint is inserted into `seen`, so a title+link pair that
/// shows up twice in one batch survives only once.
pub fn filter_new(articles: Vec<Article>, seen: &mut HashSet<String>) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|article| {
            let inserted = seen.insert(article_fingerprint(article));
            if !inserted {
                debug!("Skipping seen article: {}", article.title);
            }
            inserted
        })
        .collect()
}

/// Seen-set stored as a JSON array of fingerprint strings.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SeenStore for JsonFileStore {
    async fn load(&self) -> Result<HashSet<String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No seen-set at {}, starting empty", self.path.display());
                return Ok(HashSet::new());
            }
            Err(e) => return Err(GeneratorError::Io(e)),
        };

        let fingerprints: Vec<String> = serde_json::from_slice(&bytes)?;
        Ok(fingerprints.into_iter().collect())
    }

    async fn save(&self, seen: &HashSet<String>) -> Result<()> {
        let mut fingerprints: Vec<&String> = seen.iter().collect();
        fingerprints.sort();
        let bytes = serde_json::to_vec(&fingerprints)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename over the old state.
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Saved {} fingerprints to {}", seen.len(), self.path.display());
        Ok(())
    }
}

/// In-memory seen-set. Clones share the same underlying set.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashSet<String> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn load(&self) -> Result<HashSet<String>> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, seen: &HashSet<String>) -> Result<()> {
        *self.inner.write().await = seen.clone();
        Ok(())
    }
}
