//! Standard task sequence
//!
//! `fetch_article → summarize → synthesize_speech → render_video → publish`
//!
//! Each task reads the keys written by the ones before it and skips its work
//! when they are missing. Only `publish` records the dedup fact, through its
//! [`CompletionCallback`], and only after the post went out.

mod fetch_article;
mod publish;
mod speech;
mod summarize;
mod video;

pub use fetch_article::FetchArticleTask;
pub use publish::PublishTask;
pub use speech::SynthesizeSpeechTask;
pub use summarize::SummarizeTask;
pub use video::RenderVideoTask;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xcavator_core::{Candidate, Pipeline, Xcom, keys};

use crate::repository::DedupOracle;
use crate::service::{ArticleFetcher, Publisher, SpeechSynthesizer, Summarizer, VideoRenderer};

/// Records a work item as processed once its terminal task succeeded
///
/// Carries the tenant and key it was bound to at pipeline construction.
#[derive(Clone)]
pub struct CompletionCallback {
    pub tenant_id: Uuid,
    pub key: String,
    oracle: Arc<dyn DedupOracle>,
}

impl CompletionCallback {
    pub fn new(tenant_id: Uuid, key: impl Into<String>, oracle: Arc<dyn DedupOracle>) -> Self {
        Self {
            tenant_id,
            key: key.into(),
            oracle,
        }
    }

    /// Writes the dedup fact
    ///
    /// A failed write is logged only. The item may then be picked up again on
    /// a later cycle.
    pub async fn complete(&self) {
        match self.oracle.record(self.tenant_id, &self.key).await {
            Ok(()) => info!(key = %self.key, "Recorded as processed"),
            Err(e) => warn!(key = %self.key, "Failed to record dedup fact: {:#}", e),
        }
    }
}

impl std::fmt::Debug for CompletionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCallback")
            .field("tenant_id", &self.tenant_id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Builds one pipeline per candidate
pub trait PipelineFactory: Send + Sync {
    fn build(&self, candidate: &Candidate) -> Pipeline;
}

/// Collaborators the standard tasks call into
#[derive(Clone)]
pub struct Services {
    pub fetcher: Arc<dyn ArticleFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub renderer: Arc<dyn VideoRenderer>,
    pub publisher: Arc<dyn Publisher>,
}

/// Factory for the standard five-step sequence
pub struct StandardPipelineFactory {
    services: Services,
    oracle: Arc<dyn DedupOracle>,
    tenant_id: Uuid,
    platform: String,
    task_timeout: Duration,
    min_summary_chars: usize,
}

impl StandardPipelineFactory {
    pub fn new(
        services: Services,
        oracle: Arc<dyn DedupOracle>,
        tenant_id: Uuid,
        platform: String,
        task_timeout: Duration,
        min_summary_chars: usize,
    ) -> Self {
        Self {
            services,
            oracle,
            tenant_id,
            platform,
            task_timeout,
            min_summary_chars,
        }
    }
}

impl PipelineFactory for StandardPipelineFactory {
    fn build(&self, candidate: &Candidate) -> Pipeline {
        let mut xcom = Xcom::new();
        xcom.insert(keys::URL, candidate.link.as_str());

        let callback = CompletionCallback::new(self.tenant_id, &candidate.key, self.oracle.clone());

        Pipeline::new(candidate.key.as_str())
            .with_xcom(xcom)
            .with_task_timeout(self.task_timeout)
            .with_task(FetchArticleTask::new(
                self.services.fetcher.clone(),
                candidate.image.clone(),
            ))
            .with_task(SummarizeTask::new(self.services.summarizer.clone()))
            .with_task(SynthesizeSpeechTask::new(
                self.services.speech.clone(),
                self.min_summary_chars,
            ))
            .with_task(RenderVideoTask::new(self.services.renderer.clone()))
            .with_task(PublishTask::new(
                self.services.publisher.clone(),
                self.platform.clone(),
                callback,
            ))
    }
}

/// Removes an artifact during rollback; an already missing file is fine
async fn remove_artifact(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Scripted collaborators shared by task and scheduler tests

    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::repository::InMemoryDedupOracle;
    use xcavator_core::Article;
    use xcavator_core::dto::post::{CreatePost, PostReceipt};

    pub struct FakeFetcher {
        pub text: String,
        pub media: Option<String>,
        pub fail: bool,
    }

    impl FakeFetcher {
        pub fn with_text(text: &str) -> Self {
            Self {
                text: text.to_string(),
                media: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ArticleFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Article> {
            if self.fail {
                anyhow::bail!("unreachable: {}", url);
            }
            Ok(Article {
                headline: format!("Headline for {}", url),
                text: self.text.clone(),
                media: self.media.clone(),
            })
        }
    }

    /// Returns the input unchanged
    pub struct EchoSummarizer;

    impl Summarizer for EchoSummarizer {
        fn summarize(&self, text: &str) -> String {
            text.to_string()
        }
    }

    /// Writes a real file so rollback and cleanup can be observed
    pub struct FileSpeech {
        pub dir: PathBuf,
        pub calls: AtomicUsize,
    }

    impl FileSpeech {
        pub fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FileSpeech {
        async fn synthesize(&self, _text: &str) -> Result<PathBuf> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let path = self.dir.join(format!("speech-{}.wav", n));
            tokio::fs::write(&path, b"RIFF").await?;
            Ok(path)
        }
    }

    pub struct FileRenderer {
        pub dir: PathBuf,
        pub images: Mutex<Vec<Option<String>>>,
    }

    impl FileRenderer {
        pub fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                images: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoRenderer for FileRenderer {
        async fn render(&self, audio: &Path, image: Option<&str>) -> Result<PathBuf> {
            self.images.lock().unwrap().push(image.map(str::to_string));
            let stem = audio.file_stem().unwrap().to_string_lossy().to_string();
            let path = self.dir.join(format!("{}_reel.mp4", stem));
            tokio::fs::write(&path, b"mp4").await?;
            Ok(path)
        }
    }

    /// In-memory oracle that counts `record` calls and can be slow to record
    #[derive(Default)]
    pub struct CountingOracle {
        facts: InMemoryDedupOracle,
        recorded: Mutex<Vec<String>>,
        pub record_delay: Duration,
    }

    impl CountingOracle {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn slow(record_delay: Duration) -> Self {
            Self {
                record_delay,
                ..Self::default()
            }
        }

        /// Every completed `record` call, duplicates included
        pub fn record_calls(&self) -> usize {
            self.recorded.lock().unwrap().len()
        }

        pub fn record_calls_for(&self, key: &str) -> usize {
            self.recorded
                .lock()
                .unwrap()
                .iter()
                .filter(|k| k.as_str() == key)
                .count()
        }
    }

    #[async_trait]
    impl DedupOracle for CountingOracle {
        async fn is_processed(&self, tenant_id: Uuid, key: &str) -> Result<bool> {
            self.facts.is_processed(tenant_id, key).await
        }

        async fn record(&self, tenant_id: Uuid, key: &str) -> Result<()> {
            if !self.record_delay.is_zero() {
                tokio::time::sleep(self.record_delay).await;
            }
            self.facts.record(tenant_id, key).await?;
            self.recorded.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    pub struct FakePublisher {
        pub fail: bool,
        pub posts: Mutex<Vec<CreatePost>>,
    }

    impl FakePublisher {
        pub fn new(fail: bool) -> Self {
            Self {
                fail,
                posts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, _tenant_id: Uuid, post: &CreatePost) -> Result<PostReceipt> {
            if self.fail {
                anyhow::bail!("platform down");
            }
            let mut posts = self.posts.lock().unwrap();
            posts.push(post.clone());
            Ok(PostReceipt {
                platform: post.platform.clone(),
                post_id: format!("post-{}", posts.len()),
                post_content: serde_json::Value::Null,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::repository::InMemoryDedupOracle;

    const LONG_TEXT: &str = "The monsoon reached Kerala three days ahead of schedule this year. \
        Farmers across the southern districts welcomed the early rains after a long dry spell. \
        Officials expect the rains to spread north within the next week.";

    fn factory(
        dir: &Path,
        oracle: Arc<dyn DedupOracle>,
        publisher: Arc<FakePublisher>,
        tenant_id: Uuid,
    ) -> StandardPipelineFactory {
        let services = Services {
            fetcher: Arc::new(FakeFetcher::with_text(LONG_TEXT)),
            summarizer: Arc::new(EchoSummarizer),
            speech: Arc::new(FileSpeech::new(dir)),
            renderer: Arc::new(FileRenderer::new(dir)),
            publisher,
        };
        StandardPipelineFactory::new(
            services,
            oracle,
            tenant_id,
            "youtube".to_string(),
            Duration::from_secs(5),
            150,
        )
    }

    #[test]
    fn test_factory_builds_standard_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(
            dir.path(),
            Arc::new(InMemoryDedupOracle::new()),
            Arc::new(FakePublisher::new(false)),
            Uuid::new_v4(),
        );

        let candidate = Candidate::new("Story", "https://www.ndtv.com/india-news/story");
        let pipeline = factory.build(&candidate);

        assert_eq!(pipeline.label(), candidate.key);
        assert_eq!(
            pipeline.task_names(),
            vec![
                "fetch_article",
                "summarize",
                "synthesize_speech",
                "render_video",
                "publish"
            ]
        );
        assert_eq!(
            pipeline.xcom().require_text(keys::URL).unwrap(),
            &candidate.link
        );
    }

    #[tokio::test]
    async fn test_standard_pipeline_publishes_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let tenant_id = Uuid::new_v4();
        let oracle = Arc::new(InMemoryDedupOracle::new());
        let publisher = Arc::new(FakePublisher::new(false));
        let factory = factory(dir.path(), oracle.clone(), publisher.clone(), tenant_id);

        let candidate = Candidate::new("Story", "https://sports.ndtv.com/cricket/story");
        let report = factory.build(&candidate).run().await;

        assert!(report.is_success());
        assert!(oracle.is_processed(tenant_id, &candidate.key).await.unwrap());

        let posts = publisher.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].post_body.contains("Story Ref: https://sports.ndtv.com/cricket/story"));
        assert!(posts[0].post_body.ends_with("#news #sports"));
        assert_eq!(report.xcom.require_json("publish").unwrap()["post_id"], "post-1");
    }

    #[tokio::test]
    async fn test_failed_publish_rolls_back_and_skips_record() {
        let dir = tempfile::tempdir().unwrap();
        let tenant_id = Uuid::new_v4();
        let oracle = Arc::new(InMemoryDedupOracle::new());
        let factory = factory(
            dir.path(),
            oracle.clone(),
            Arc::new(FakePublisher::new(true)),
            tenant_id,
        );

        let candidate = Candidate::new("Story", "https://www.ndtv.com/india-news/story");
        let report = factory.build(&candidate).run().await;

        assert_eq!(report.failed_task(), Some("publish"));
        assert!(!oracle.is_processed(tenant_id, &candidate.key).await.unwrap());

        let video = report.xcom.require_path(keys::VIDEO).unwrap();
        assert!(!video.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_record_does_not_fail_published_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let tenant_id = Uuid::new_v4();
        let oracle = Arc::new(CountingOracle::slow(Duration::from_secs(10)));
        let publisher = Arc::new(FakePublisher::new(false));
        let factory = factory(dir.path(), oracle.clone(), publisher.clone(), tenant_id);

        let candidate = Candidate::new("Story", "https://www.ndtv.com/india-news/slow");
        let report = factory.build(&candidate).run().await;

        assert!(report.is_success());
        assert!(report.rolled_back.is_empty());
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);
        assert_eq!(oracle.record_calls_for(&candidate.key), 1);
        assert!(oracle.is_processed(tenant_id, &candidate.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_callback_records_for_bound_tenant() {
        let oracle = Arc::new(InMemoryDedupOracle::new());
        let tenant_id = Uuid::new_v4();
        let callback = CompletionCallback::new(tenant_id, "https://example.com/a", oracle.clone());

        callback.complete().await;
        callback.complete().await;

        assert_eq!(oracle.len(), 1);
        assert!(oracle.is_processed(tenant_id, "https://example.com/a").await.unwrap());
        assert!(!oracle.is_processed(Uuid::new_v4(), "https://example.com/a").await.unwrap());
    }
}
