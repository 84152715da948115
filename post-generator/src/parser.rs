use crate::types::{Article, GeneratorError, ParsedEntry, ParsedFeed, Result};
use crate::utils::{text, url};
use chrono::{SecondsFormat, Utc};
use feed_rs::parser;
use tracing::debug;

pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse RSS, Atom or JSON Feed content, keeping every entry in feed order.
    pub fn parse_feed(&self, content: &str) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| GeneratorError::FeedParse(format!("Failed to parse feed: {}", e)))?;

        let title = feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty());

        let entries: Vec<ParsedEntry> = feed.entries.into_iter().map(Self::parse_entry).collect();

        debug!("Parsed feed with {} entries", entries.len());

        Ok(ParsedFeed { title, entries })
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> ParsedEntry {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let link = article_link(&entry.links).unwrap_or_default();

        // Prefer the summary; Atom entries sometimes only carry content.
        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        ParsedEntry {
            title,
            link,
            description,
            published_at: entry.published,
        }
    }
}

/// The entry's own page: the `alternate` link (or one without a `rel`),
/// falling back to whatever link comes first.
fn article_link(links: &[feed_rs::model::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the first `limit` entries of a feed to articles.
///
/// The source is the feed's own title, or the host of `feed_url` when the
/// feed has none. Entries without a publish date are stamped with the
/// current time.
pub fn entries_to_articles(
    feed: &ParsedFeed,
    feed_url: &str,
    limit: usize,
    description_limit: usize,
) -> Vec<Article> {
    let source = feed
        .title
        .clone()
        .or_else(|| url::host_name(feed_url))
        .unwrap_or_else(|| feed_url.to_string());

    feed.entries
        .iter()
        .take(limit)
        .map(|entry| Article {
            title: entry.title.clone(),
            description: text::truncate_chars(
                entry.description.as_deref().unwrap_or_default(),
                description_limit,
            )
            .to_string(),
            link: entry.link.clone(),
            published: entry
                .published_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339_opts(SecondsFormat::AutoSi, false),
            source: source.clone(),
        })
        .collect()
}
