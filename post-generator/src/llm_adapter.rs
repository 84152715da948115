use crate::config::GenerationConfig;
use crate::types::{Article, GeneratorError, Result};
use crate::utils::text;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Trait for LLM adapters that turn an article into blog post prose
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Generate the markdown body of a post. One request per call, no retries.
    async fn generate_post(&self, article: &Article) -> Result<String>;
}

const ERROR_BODY_LIMIT: usize = 300;

/// Build the single user message sent for an article.
pub fn build_prompt(article: &Article) -> String {
    format!(
        "Write a comprehensive blog post about this cryptocurrency news:

Title: {}
Description: {}
Source: {}

Requirements:
- Write 500-1000 words of original analysis
- Include relevant context about crypto markets
- Cite the source
- Use Markdown formatting
- NO frontmatter (we'll add that separately)
- Include relevant crypto terms naturally
- Be informative but accessible

Return only the markdown content.",
        article.title, article.description, article.source
    )
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Pull the generated text out of a messages API response body.
pub fn parse_generated_text(body: &str) -> Result<String> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    let text = response
        .content
        .into_iter()
        .next()
        .ok_or_else(|| GeneratorError::MalformedResponse("empty content array".to_string()))?
        .text
        .ok_or_else(|| GeneratorError::MalformedResponse("first content block has no text".to_string()))?;

    if text.trim().is_empty() {
        return Err(GeneratorError::MalformedResponse("generated text is empty".to_string()));
    }
    Ok(text)
}

/// Adapter for the Anthropic messages API.
pub struct AnthropicAdapter {
    client: Client,
    config: GenerationConfig,
}

impl AnthropicAdapter {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmAdapter for AnthropicAdapter {
    fn adapter_name(&self) -> String {
        format!("Anthropic ({})", self.config.model)
    }

    async fn generate_post(&self, article: &Article) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GeneratorError::MissingCredential("ANTHROPIC_API_KEY"))?;

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(article),
            }],
        };

        info!("Generating post with {}", self.adapter_name());

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GeneratorError::UnexpectedResponse {
                status: status.as_u16(),
                body: text::truncate_chars(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }

        let generated = parse_generated_text(&body)?;
        debug!("Generated {} characters", generated.len());
        Ok(generated)
    }
}

/// Mock LLM adapter for development and testing
#[derive(Clone)]
pub struct MockLlmAdapter {
    name: String,
    failing_titles: HashSet<String>,
    calls: Arc<AtomicUsize>,
}

impl MockLlmAdapter {
    pub fn new(name: String) -> Self {
        Self {
            name,
            failing_titles: HashSet::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make generation for `title` fail as if the request timed out.
    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    /// Number of generation requests seen so far, across clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("Mock LLM Adapter ({})", self.name)
    }

    async fn generate_post(&self, article: &Article) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_titles.contains(&article.title) {
            return Err(GeneratorError::General(format!(
                "request for '{}' timed out",
                article.title
            )));
        }

        Ok(format!(
            "## {}\n\n{}\n\nAccording to {}, this story is developing.",
            article.title, article.description, article.source
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            title: "Ethereum upgrade ships".to_string(),
            description: "The network activated its latest fork.".to_string(),
            link: "https://example.com/eth".to_string(),
            published: "2024-03-01T10:00:00+00:00".to_string(),
            source: "CoinDesk".to_string(),
        }
    }

    #[test]
    fn test_prompt_includes_article_and_instructions() {
        let prompt = build_prompt(&article());
        assert!(prompt.contains("Title: Ethereum upgrade ships"));
        assert!(prompt.contains("Description: The network activated its latest fork."));
        assert!(prompt.contains("Source: CoinDesk"));
        assert!(prompt.contains("500-1000 words"));
        assert!(prompt.contains("NO frontmatter"));
        assert!(prompt.contains("Cite the source"));
    }

    #[test]
    fn test_parse_generated_text() {
        let body = r##"{"id":"msg_1","content":[{"type":"text","text":"# Hello"}],"role":"assistant"}"##;
        assert_eq!(parse_generated_text(body).unwrap(), "# Hello");
    }

    #[test]
    fn test_parse_generated_text_rejects_bad_shapes() {
        assert!(matches!(
            parse_generated_text(r#"{"content":[]}"#),
            Err(GeneratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_generated_text(r#"{"content":[{"type":"tool_use"}]}"#),
            Err(GeneratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_generated_text(r#"{"content":[{"type":"text","text":"  "}]}"#),
            Err(GeneratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_generated_text(r#"{"error":"nope"}"#),
            Err(GeneratorError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let adapter = AnthropicAdapter::new(GenerationConfig::default()).unwrap();
        let result = adapter.generate_post(&article()).await;
        assert!(matches!(
            result,
            Err(GeneratorError::MissingCredential("ANTHROPIC_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn test_mock_adapter_counts_and_fails() {
        let adapter = MockLlmAdapter::new("test".to_string()).failing_on("Ethereum upgrade ships");
        let handle = adapter.clone();

        assert!(adapter.generate_post(&article()).await.is_err());
        let other = Article {
            title: "Something else".to_string(),
            ..article()
        };
        assert!(adapter.generate_post(&other).await.is_ok());
        assert_eq!(handle.call_count(), 2);
    }
}
