//! Runner configuration
//!
//! Defines all configurable parameters for the runner including the tenant
//! scope, polling cadence, worker-pool sizing and the external tools and
//! services the standard pipeline talks to.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// What the scheduler does when the dedup oracle cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupFailurePolicy {
    /// Treat the candidate as processed and skip it this cycle
    Skip,
    /// Treat the candidate as novel and dispatch it
    Dispatch,
}

impl FromStr for DedupFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "dispatch" => Ok(Self::Dispatch),
            other => anyhow::bail!("unknown dedup failure policy '{}'", other),
        }
    }
}

/// Settings the scheduler loop consumes
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Tenant scope used for dedup lookups and records
    pub tenant_id: Uuid,

    /// Maximum pipelines taken off the pending queue per batch
    pub batch_size: usize,

    /// Maximum pipelines executing at once
    pub max_concurrent: usize,

    /// Minimum time between discoveries while a backlog exists, and the
    /// sleep between cycles
    pub poll_interval: Duration,

    pub dedup_failure_policy: DedupFailurePolicy,
}

/// Runner configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Tenant this runner publishes for
    pub tenant_id: Uuid,

    /// Listing page scraped for candidates
    pub listing_url: String,

    /// Socials service base URL (e.g., "http://127.0.0.1:8081")
    pub socials_url: String,

    /// Postgres URL for dedup records; in-memory tracking when unset
    pub database_url: Option<String>,

    /// How often to look for new candidates
    pub poll_interval: Duration,

    /// Maximum pipelines dispatched per batch
    pub batch_size: usize,

    /// Maximum pipelines running at once
    pub max_concurrent: usize,

    /// Maximum time a single task may run before it counts as failed
    pub task_timeout: Duration,

    /// Timeout for outbound HTTP requests
    pub http_timeout: Duration,

    /// Directory for intermediate audio/image/video files
    pub work_dir: PathBuf,

    /// Piper text-to-speech binary
    pub piper_binary: PathBuf,

    /// Piper voice model
    pub piper_model: PathBuf,

    /// ffmpeg binary
    pub ffmpeg_binary: PathBuf,

    /// Sentences kept by the summarizer
    pub summary_sentences: usize,

    /// Summaries at or below this length are not narrated
    pub min_summary_chars: usize,

    /// Platform posts are published on
    pub platform: String,

    pub dedup_failure_policy: DedupFailurePolicy,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(tenant_id: Uuid, listing_url: String, socials_url: String) -> Self {
        Self {
            tenant_id,
            listing_url,
            socials_url,
            database_url: None,
            poll_interval: Duration::from_secs(980),
            batch_size: 20,
            max_concurrent: 2,
            task_timeout: Duration::from_secs(300), // 5 minutes
            http_timeout: Duration::from_secs(10),
            work_dir: PathBuf::from("/tmp"),
            piper_binary: PathBuf::from("piper"),
            piper_model: PathBuf::from("en_US-ryan-high.onnx"),
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            summary_sentences: 6,
            min_summary_chars: 150,
            platform: "youtube".to_string(),
            dedup_failure_policy: DedupFailurePolicy::Skip,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - TENANT_ID (required, UUID)
    /// - LISTING_URL (optional, default: NDTV latest news)
    /// - SOCIALS_URL (optional, default: http://127.0.0.1:8081)
    /// - DATABASE_URL (optional)
    /// - POLL_INTERVAL (optional, seconds, default: 980)
    /// - BATCH_SIZE (optional, default: 20)
    /// - MAX_CONCURRENT (optional, default: 2)
    /// - TASK_TIMEOUT (optional, seconds, default: 300)
    /// - HTTP_TIMEOUT (optional, seconds, default: 10)
    /// - WORK_DIR, PIPER_BINARY, PIPER_MODEL, FFMPEG_BINARY (optional paths)
    /// - SUMMARY_SENTENCES (optional, default: 6)
    /// - MIN_SUMMARY_CHARS (optional, default: 150)
    /// - PLATFORM (optional, default: youtube)
    /// - DEDUP_FAILURE_POLICY (optional, skip|dispatch, default: skip)
    pub fn from_env() -> anyhow::Result<Self> {
        let tenant_id = std::env::var("TENANT_ID")
            .map_err(|_| anyhow::anyhow!("TENANT_ID environment variable not set"))?;
        let tenant_id = Uuid::parse_str(tenant_id.trim())
            .map_err(|e| anyhow::anyhow!("TENANT_ID is not a valid UUID: {}", e))?;

        let listing_url = std::env::var("LISTING_URL")
            .unwrap_or_else(|_| "https://www.ndtv.com/latest".to_string());

        let socials_url =
            std::env::var("SOCIALS_URL").unwrap_or_else(|_| "http://127.0.0.1:8081".to_string());

        let mut config = Self::new(tenant_id, listing_url, socials_url);

        config.database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        if let Some(secs) = env_parse::<u64>("POLL_INTERVAL") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(size) = env_parse::<usize>("BATCH_SIZE") {
            config.batch_size = size;
        }
        if let Some(workers) = env_parse::<usize>("MAX_CONCURRENT") {
            config.max_concurrent = workers;
        }
        if let Some(secs) = env_parse::<u64>("TASK_TIMEOUT") {
            config.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("HTTP_TIMEOUT") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("PIPER_BINARY") {
            config.piper_binary = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("PIPER_MODEL") {
            config.piper_model = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FFMPEG_BINARY") {
            config.ffmpeg_binary = PathBuf::from(path);
        }
        if let Some(n) = env_parse::<usize>("SUMMARY_SENTENCES") {
            config.summary_sentences = n;
        }
        if let Some(n) = env_parse::<usize>("MIN_SUMMARY_CHARS") {
            config.min_summary_chars = n;
        }
        if let Ok(platform) = std::env::var("PLATFORM") {
            config.platform = platform;
        }
        if let Ok(policy) = std::env::var("DEDUP_FAILURE_POLICY") {
            config.dedup_failure_policy = policy.parse()?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tenant_id.is_nil() {
            anyhow::bail!("tenant_id cannot be the nil UUID");
        }

        for (name, url) in [
            ("listing_url", &self.listing_url),
            ("socials_url", &self.socials_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if self.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be greater than 0");
        }

        if self.task_timeout.is_zero() {
            anyhow::bail!("task_timeout must be greater than 0");
        }

        if self.summary_sentences == 0 {
            anyhow::bail!("summary_sentences must be greater than 0");
        }

        if self.platform.trim().is_empty() {
            anyhow::bail!("platform cannot be empty");
        }

        Ok(())
    }

    /// Extracts the settings the scheduler loop needs
    pub fn scheduler(&self) -> SchedulerSettings {
        SchedulerSettings {
            tenant_id: self.tenant_id,
            batch_size: self.batch_size,
            max_concurrent: self.max_concurrent,
            poll_interval: self.poll_interval,
            dedup_failure_policy: self.dedup_failure_policy,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
