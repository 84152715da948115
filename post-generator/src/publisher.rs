use crate::config::PublishConfig;
use crate::traits::Publisher;
use crate::types::{Destination, GeneratorError, Result};
use crate::utils::text;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ERROR_BODY_LIMIT: usize = 300;

/// Writes posts into a local content directory. Existing files with the same
/// name are overwritten.
pub struct LocalPublisher {
    content_dir: PathBuf,
}

impl LocalPublisher {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.content_dir.join(filename)
    }

    /// Remove a local post. Returns false if there was nothing to remove.
    pub async fn remove(&self, filename: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(filename)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GeneratorError::Io(e)),
        }
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    fn publisher_name(&self) -> String {
        format!("local ({})", self.content_dir.display())
    }

    async fn publish(&self, filename: &str, content: &str, _title: &str) -> Result<Destination> {
        tokio::fs::create_dir_all(&self.content_dir).await?;
        let path = self.path_for(filename);
        tokio::fs::write(&path, content).await?;

        info!("Saved locally: {}", path.display());
        Ok(Destination::Local { path })
    }
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteContentsRequest<'a> {
    message: &'a str,
    sha: String,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

/// Commits posts through the GitHub repository contents API.
pub struct GitHubPublisher {
    client: Client,
    token: String,
    owner: String,
    repo: String,
    config: PublishConfig,
}

impl GitHubPublisher {
    /// Fails when no token is configured or the repository is not `owner/name`.
    pub fn new(config: PublishConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or(GeneratorError::MissingCredential("GITHUB_TOKEN"))?;
        let (owner, repo) = config.owner_and_repo()?;
        let (owner, repo) = (owner.to_string(), repo.to_string());

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            token,
            owner,
            repo,
            config,
        })
    }

    pub fn repository_path(&self, filename: &str) -> String {
        format!("{}/{}", self.config.path_prefix.trim_end_matches('/'), filename)
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url(), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Blob sha of an existing file on the target branch, if any. Lookup
    /// failures are treated as "file does not exist yet".
    pub async fn existing_sha(&self, path: &str) -> Option<String> {
        let request = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())]);

        let response = match self.authorized(request).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("No existing file at {} (HTTP {})", path, response.status());
                return None;
            }
            Err(e) => {
                debug!("Lookup of {} failed: {}", path, e);
                return None;
            }
        };

        response.json::<ContentsResponse>().await.ok().map(|c| c.sha)
    }

    /// Create or update `path` with `content` in a single commit.
    pub async fn commit_file(&self, path: &str, content: &str, message: &str) -> Result<()> {
        let sha = self.existing_sha(path).await;
        if sha.is_some() {
            debug!("Updating existing file {}", path);
        }

        let body = PutContentsRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            branch: &self.config.branch,
            sha,
        };

        info!("Committing {} to {}/{}", path, self.owner, self.repo);

        let response = self
            .authorized(self.client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await?;

        ensure_success(response).await
    }

    pub async fn delete_file(&self, path: &str, message: &str) -> Result<()> {
        let sha = self.existing_sha(path).await.ok_or_else(|| {
            GeneratorError::General(format!("{} not found in {}/{}", path, self.owner, self.repo))
        })?;

        let body = DeleteContentsRequest {
            message,
            sha,
            branch: &self.config.branch,
        };

        let response = self
            .authorized(self.client.delete(self.contents_url(path)))
            .json(&body)
            .send()
            .await?;

        ensure_success(response).await?;
        info!("Deleted {} from {}/{}", path, self.owner, self.repo);
        Ok(())
    }

    /// Whether the token can see the target repository.
    pub async fn verify_credentials(&self) -> Result<bool> {
        let response = self.authorized(self.client.get(self.repo_url())).send().await?;
        Ok(response.status().is_success())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(GeneratorError::UnexpectedResponse {
        status: status.as_u16(),
        body: text::truncate_chars(&body, ERROR_BODY_LIMIT).to_string(),
    })
}

#[async_trait]
impl Publisher for GitHubPublisher {
    fn publisher_name(&self) -> String {
        format!("github ({}/{}@{})", self.owner, self.repo, self.config.branch)
    }

    async fn publish(&self, filename: &str, content: &str, title: &str) -> Result<Destination> {
        let path = self.repository_path(filename);
        let message = format!("AI: Auto-generated post - {}", title);

        self.commit_file(&path, content, &message).await?;

        info!("Committed to GitHub: {}", filename);
        Ok(Destination::Remote { path })
    }
}

/// Try the remote publisher first and fall back to the local directory on
/// any failure, including a missing remote.
pub struct FallbackPublisher {
    remote: Option<Box<dyn Publisher>>,
    local: LocalPublisher,
}

impl FallbackPublisher {
    pub fn new(remote: Option<Box<dyn Publisher>>, local: LocalPublisher) -> Self {
        Self { remote, local }
    }

    pub fn local_only(local: LocalPublisher) -> Self {
        Self::new(None, local)
    }

    /// Remote publishing is enabled when a usable token and repository are
    /// configured; otherwise posts go straight to `content_dir`.
    pub fn from_config(config: PublishConfig, content_dir: impl Into<PathBuf>) -> Self {
        let local = LocalPublisher::new(content_dir);
        match GitHubPublisher::new(config) {
            Ok(remote) => Self::new(Some(Box::new(remote)), local),
            Err(e) => {
                warn!("Remote publishing disabled ({}), saving locally only", e);
                Self::local_only(local)
            }
        }
    }
}

#[async_trait]
impl Publisher for FallbackPublisher {
    fn publisher_name(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{} with {} fallback", remote.publisher_name(), self.local.publisher_name()),
            None => self.local.publisher_name(),
        }
    }

    async fn publish(&self, filename: &str, content: &str, title: &str) -> Result<Destination> {
        if let Some(remote) = &self.remote {
            match remote.publish(filename, content, title).await {
                Ok(destination) => return Ok(destination),
                Err(e) => {
                    error!("{} publish failed: {}", remote.publisher_name(), e);
                    warn!("Saving locally instead");
                }
            }
        }

        self.local.publish(filename, content, title).await
    }
}
