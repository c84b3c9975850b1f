//! Xcavator Runner
//!
//! Discovers news stories, turns each into a narrated reel through a task
//! pipeline and publishes it, never processing the same story twice for a
//! tenant.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: where candidates come from and where dedup facts live
//! - Services: article fetching, summarizing, speech, video, publishing
//! - Tasks: the standard pipeline steps built on those services
//! - Scheduler: discovery, filtering and the bounded worker pool

mod config;
mod db;
mod repository;
mod scheduler;
mod service;
mod tasks;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xcavator_client::SocialsClient;

use crate::config::Config;
use crate::repository::{
    DedupOracle, HtmlListingDiscoverer, InMemoryDedupOracle, ListingSelectors, PgDedupOracle,
};
use crate::scheduler::Scheduler;
use crate::service::{
    FfmpegRenderer, FrequencySummarizer, HtmlArticleFetcher, PiperSpeech, SocialsPublisher,
};
use crate::tasks::{Services, StandardPipelineFactory};

#[derive(Parser)]
#[command(name = "xcavator")]
#[command(about = "News-to-reel publishing runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run,
    /// Run a single discover and dispatch cycle, then exit
    Once,
    /// Check whether a work item was already processed
    Check {
        /// Work-item key (the story link)
        key: String,
    },
    /// Record a work item as processed
    Mark {
        /// Work-item key (the story link)
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xcavator_runner=info,xcavator_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: tenant_id={}, listing_url={}, socials_url={}",
        config.tenant_id, config.listing_url, config.socials_url
    );

    let oracle = connect_oracle(&config).await?;

    match cli.command {
        Commands::Check { key } => {
            let processed = oracle.is_processed(config.tenant_id, &key).await?;
            println!("{}", if processed { "processed" } else { "new" });
            Ok(())
        }
        Commands::Mark { key } => {
            oracle.record(config.tenant_id, &key).await?;
            info!("Recorded {} as processed", key);
            Ok(())
        }
        Commands::Once => {
            let mut scheduler = build_scheduler(&config, oracle).await?;
            let summary = scheduler.run_once().await;
            info!(
                "Cycle finished: {} queued, {} succeeded, {} rolled back",
                summary.queued, summary.pipelines.succeeded, summary.pipelines.rolled_back
            );
            Ok(())
        }
        Commands::Run => {
            let scheduler = build_scheduler(&config, oracle).await?;
            let handle = scheduler.spawn();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutdown signal received, draining in-flight pipelines");

            handle.shutdown().await?;
            info!("Runner stopped");
            Ok(())
        }
    }
}

/// Postgres-backed tracking when `DATABASE_URL` is set, in-memory otherwise
async fn connect_oracle(config: &Config) -> Result<Arc<dyn DedupOracle>> {
    match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url)
                .await
                .context("Failed to connect to database")?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            info!("Dedup facts stored in Postgres");
            Ok(Arc::new(PgDedupOracle::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, dedup facts are kept in memory only");
            Ok(Arc::new(InMemoryDedupOracle::new()))
        }
    }
}

async fn build_scheduler(config: &Config, oracle: Arc<dyn DedupOracle>) -> Result<Scheduler> {
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.work_dir.display()))?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let socials = SocialsClient::with_client(config.socials_url.clone(), http.clone());
    wait_for_socials(&socials).await;

    let services = Services {
        fetcher: Arc::new(HtmlArticleFetcher::new(http.clone())),
        summarizer: Arc::new(FrequencySummarizer::new(config.summary_sentences)?),
        speech: Arc::new(PiperSpeech::new(
            config.piper_binary.clone(),
            config.piper_model.clone(),
            config.work_dir.clone(),
        )),
        renderer: Arc::new(FfmpegRenderer::new(
            config.ffmpeg_binary.clone(),
            config.work_dir.clone(),
            http.clone(),
        )),
        publisher: Arc::new(SocialsPublisher::new(socials)),
    };

    let factory = StandardPipelineFactory::new(
        services,
        oracle.clone(),
        config.tenant_id,
        config.platform.clone(),
        config.task_timeout,
        config.min_summary_chars,
    );

    let discoverer = HtmlListingDiscoverer::new(
        http,
        config.listing_url.clone(),
        &ListingSelectors::default(),
    )?;

    info!("Services initialized");

    Ok(Scheduler::new(
        config.scheduler(),
        Arc::new(discoverer),
        oracle,
        Arc::new(factory),
    ))
}

/// Waits for the socials service with exponential backoff
///
/// The service may still be starting in container environments. After the
/// last attempt the runner starts anyway; publishing then fails per pipeline
/// and the items are retried on later cycles.
async fn wait_for_socials(client: &SocialsClient) {
    const MAX_RETRIES: u32 = 5;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut delay_ms = INITIAL_DELAY_MS;

    for attempt in 1..=MAX_RETRIES {
        match client.health().await {
            Ok(true) => {
                if attempt > 1 {
                    info!("Socials service reachable after {} attempt(s)", attempt);
                }
                return;
            }
            Ok(false) => warn!(
                "Socials service unhealthy (attempt {}/{})",
                attempt, MAX_RETRIES
            ),
            Err(e) => warn!(
                "Socials service unreachable (attempt {}/{}): {}",
                attempt, MAX_RETRIES, e
            ),
        }

        if attempt < MAX_RETRIES {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            // Exponential backoff with cap
            delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
        }
    }

    error!(
        "Socials service still unavailable after {} attempts, starting anyway",
        MAX_RETRIES
    );
}
