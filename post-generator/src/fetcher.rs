use crate::config::FetchConfig;
use crate::types::{GeneratorError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Downloads raw feed documents. One attempt per call, no retries.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let url = Url::parse(url)?;
        let start_time = Instant::now();

        debug!("Fetching feed: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(GeneratorError::UnexpectedResponse {
                status: status.as_u16(),
                body: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        if let Some(content_length) = response.content_length() {
            if exceeds_size_cap(content_length, self.config.max_feed_size_mb) {
                return Err(too_large(content_length, self.config.max_feed_size_mb));
            }
        }

        // Chunked responses carry no length up front.
        let content = response.text().await?;
        if exceeds_size_cap(content.len() as u64, self.config.max_feed_size_mb) {
            return Err(too_large(content.len() as u64, self.config.max_feed_size_mb));
        }
        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );

        Ok(content)
    }
}

fn exceeds_size_cap(content_length: u64, max_feed_size_mb: usize) -> bool {
    content_length > (max_feed_size_mb as u64).saturating_mul(1024 * 1024)
}

fn too_large(bytes: u64, max_feed_size_mb: usize) -> GeneratorError {
    GeneratorError::General(format!(
        "Feed too large: {} bytes (limit {}MB)",
        bytes, max_feed_size_mb
    ))
}
