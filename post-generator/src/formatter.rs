//! Hugo post formatting: slugs, tags and TOML front matter.

use crate::config::DocumentConfig;
use crate::types::{Article, GeneratorError, Result};
use crate::utils::text;
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use regex::Regex;
use std::sync::LazyLock;

pub const BASELINE_TAGS: [&str; 2] = ["crypto", "news"];
pub const MAX_TAGS: usize = 5;
pub const SLUG_LIMIT: usize = 50;
pub const DESCRIPTION_LIMIT: usize = 160;

const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("bitcoin", &["bitcoin", "btc"]),
    ("ethereum", &["ethereum", "eth"]),
    ("defi", &["defi", "decentralized finance"]),
    ("altcoins", &["altcoin", "altcoins"]),
    ("nft", &["nft", "nfts"]),
    ("regulations", &["regulation", "sec", "cftc", "regulatory"]),
    ("trading", &["trading", "trader", "trade"]),
    ("exchanges", &["exchange", "coinbase", "binance", "kraken"]),
];

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug strip pattern"));
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("slug separator pattern"));

/// Filename-safe form of a title. The final cut is a hard character cut at
/// [`SLUG_LIMIT`], so it may land mid-word.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = SEPARATOR_RUNS.replace_all(&stripped, "-");
    text::truncate_chars(hyphenated.trim_matches('-'), SLUG_LIMIT).to_string()
}

pub fn post_filename(title: &str) -> String {
    format!("{}.md", slugify(title))
}

/// Baseline tags plus every keyword group whose keyword appears in the
/// lowercased title. Deduplicated, at most [`MAX_TAGS`].
pub fn extract_tags(article: &Article) -> Vec<String> {
    let title = article.title.to_lowercase();
    let mut tags: Vec<String> = BASELINE_TAGS.iter().map(|t| t.to_string()).collect();

    for (tag, keywords) in TAG_KEYWORDS {
        if keywords.iter().any(|keyword| title.contains(keyword)) && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    tags.truncate(MAX_TAGS);
    tags
}

/// Parse an article timestamp and render it in ISO 8601.
///
/// A trailing `Z` is read as `+00:00`. Timestamps without an offset are kept
/// naive.
pub fn normalize_date(published: &str) -> Result<String> {
    let trimmed = published.trim();
    let candidate = match trimmed.strip_suffix('Z') {
        Some(rest) => format!("{}+00:00", rest),
        None => trimmed.to_string(),
    };

    if let Ok(date) = DateTime::parse_from_rfc3339(&candidate) {
        return Ok(date.to_rfc3339_opts(SecondsFormat::AutoSi, false));
    }

    NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|date| date.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        .map_err(|_| GeneratorError::InvalidTimestamp(published.to_string()))
}

/// A finished post: front matter values plus markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub date: String,
    pub draft: bool,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub author: String,
    pub show_toc: bool,
    pub toc_open: bool,
    pub hide_meta: bool,
    pub body: String,
}

impl GeneratedDocument {
    /// Render as a Hugo content file with `+++` TOML front matter.
    pub fn render(&self) -> String {
        format!(
            "+++
date = '{date}'
draft = {draft}
title = '{title}'
description = \"{description}\"
tags = {tags}
categories = {categories}
author = \"{author}\"
showToc = {show_toc}
TocOpen = {toc_open}
hidemeta = {hide_meta}
+++

{body}",
            date = self.date,
            draft = self.draft,
            title = self.title.replace('\'', "\\'"),
            description = self.description.replace('"', "\\\""),
            tags = json_list(&self.tags),
            categories = json_list(&self.categories),
            author = self.author,
            show_toc = self.show_toc,
            toc_open = self.toc_open,
            hide_meta = self.hide_meta,
            body = self.body,
        )
    }
}

fn json_list(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| serde_json::Value::from(item.as_str()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

pub struct DocumentFormatter {
    config: DocumentConfig,
}

impl DocumentFormatter {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Fails only when the article's timestamp cannot be parsed.
    pub fn create_document(&self, article: &Article, content: &str) -> Result<GeneratedDocument> {
        let date = normalize_date(&article.published)?;

        let body = format!(
            "{}\n\n---\n\n*Source: {}*\n*Original: [{}]({})*",
            content, article.source, article.title, article.link
        );

        Ok(GeneratedDocument {
            date,
            draft: self.config.draft,
            title: article.title.clone(),
            description: text::truncate_chars(&article.description, DESCRIPTION_LIMIT).to_string(),
            tags: extract_tags(article),
            categories: vec![self.config.category.clone()],
            author: self.config.author.clone(),
            show_toc: true,
            toc_open: false,
            hide_meta: false,
            body,
        })
    }
}

impl Default for DocumentFormatter {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}
