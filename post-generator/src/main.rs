use anyhow::Context;
use clap::{Parser, Subcommand};
use post_generator::config::Config;
use post_generator::formatter::post_filename;
use post_generator::{GitHubPublisher, LocalPublisher, Pipeline};
use std::path::PathBuf;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Turn crypto news feeds into Hugo blog posts.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Local directory for posts that are not committed remotely
    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,

    /// JSON file holding fingerprints of processed articles
    #[arg(long, global = true)]
    seen_path: Option<PathBuf>,

    /// Target repository as owner/name
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Feed URL to poll; repeat to poll several. Replaces the default list
    #[arg(long = "feed", global = true)]
    feeds: Vec<String>,

    /// Maximum number of new articles to generate per run
    #[arg(long, global = true)]
    batch_cap: Option<usize>,

    /// Only mark an article as seen after its post is published
    #[arg(long, global = true)]
    mark_seen_after_publish: bool,

    /// Write posts with draft = true
    #[arg(long, global = true)]
    draft: bool,

    /// Ignore GITHUB_TOKEN and always write to the content directory
    #[arg(long, global = true)]
    local_only: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, generate and publish one batch of posts (default)
    Run,
    /// Check that the configured credentials work
    Verify,
    /// Delete a previously published post by its title
    Delete {
        #[arg(long)]
        title: String,
    },
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.content_dir {
            config.content_dir = dir.clone();
        }
        if let Some(path) = &self.seen_path {
            config.seen_path = path.clone();
        }
        if let Some(repo) = &self.repo {
            config.publish.repository = repo.clone();
        }
        if !self.feeds.is_empty() {
            config.feeds = self.feeds.clone();
        }
        if let Some(batch_cap) = self.batch_cap {
            config.batch_cap = batch_cap;
        }
        if self.mark_seen_after_publish {
            config.mark_seen_after_publish = true;
        }
        if self.draft {
            config.document.draft = true;
        }
        if self.local_only {
            config.publish.token = None;
        }
    }
}

/// `RUST_LOG` sets the base filter (default `info`); `--verbose` raises this
/// crate to debug on top of it.
fn log_filter(env_filter: Option<EnvFilter>, verbose: bool) -> EnvFilter {
    let filter = env_filter.unwrap_or_else(|| EnvFilter::new("info"));
    if !verbose {
        return filter;
    }
    match "post_generator=debug".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn init_tracing(verbose: bool) {
    let filter = log_filter(EnvFilter::try_from_default_env().ok(), verbose);
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_env();
    cli.apply(&mut config);

    let run_id = Uuid::new_v4();
    let span = info_span!("post_generator", %run_id);

    let outcome = match &cli.command {
        None | Some(Command::Run) => run(&config).instrument(span).await,
        Some(Command::Verify) => verify(&config).instrument(span).await,
        Some(Command::Delete { title }) => delete(&config, title).instrument(span).await,
    };

    // Failures are reported, never turned into a non-zero exit.
    if let Err(e) = outcome {
        error!("{:#}", e);
    }
    Ok(())
}

async fn run(config: &Config) -> anyhow::Result<()> {
    info!("Starting post generator");

    let pipeline = Pipeline::from_config(config).context("failed to set up pipeline")?;
    let summary = pipeline.run().await.context("run aborted")?;

    info!(
        fetched = summary.fetched,
        new = summary.new,
        attempted = summary.attempted,
        skipped_generation = summary.skipped_generation,
        failed_format = summary.failed_format,
        failed_publish = summary.failed_publish,
        published_remote = summary.published_remote,
        published_local = summary.published_local,
        "Generated {} posts",
        summary.generated
    );
    Ok(())
}

async fn verify(config: &Config) -> anyhow::Result<()> {
    if config.generation.api_key.is_some() {
        info!("Generation API key is configured");
    } else {
        warn!("ANTHROPIC_API_KEY not set, generation is disabled");
    }

    let publisher = GitHubPublisher::new(config.publish.clone())
        .context("remote publishing is not configured")?;
    if publisher
        .verify_credentials()
        .await
        .context("credential check failed")?
    {
        info!("GitHub token can access {}", config.publish.repository);
    } else {
        warn!("GitHub token cannot access {}", config.publish.repository);
    }
    Ok(())
}

async fn delete(config: &Config, title: &str) -> anyhow::Result<()> {
    let filename = post_filename(title);

    let local = LocalPublisher::new(&config.content_dir);
    if local.remove(&filename).await? {
        info!("Removed local copy {}", local.path_for(&filename).display());
    }

    let publisher = GitHubPublisher::new(config.publish.clone())
        .context("remote publishing is not configured")?;
    publisher
        .delete_file(&publisher.repository_path(&filename), &format!("delete: {}", title))
        .await
        .with_context(|| format!("failed to delete {}", filename))?;
    Ok(())
}
