use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use xcavator_core::dto::post::CreatePost;
use xcavator_core::{Task, TaskError, Xcom, XcomValue, keys};

use super::CompletionCallback;
use crate::service::Publisher;

/// Publishes the reel, then marks the work item as processed
///
/// The dedup record is written from `on_success`, so a slow record can never
/// turn a post that went out into a failed, rolled-back task. Without a video there is nothing to post: the task succeeds without
/// firing its callback, so the item comes back on a later cycle.
pub struct PublishTask {
    publisher: Arc<dyn Publisher>,
    platform: String,
    on_complete: CompletionCallback,
}

impl PublishTask {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        platform: String,
        on_complete: CompletionCallback,
    ) -> Self {
        Self {
            publisher,
            platform,
            on_complete,
        }
    }
}

#[async_trait]
impl Task for PublishTask {
    fn name(&self) -> &str {
        "publish"
    }

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
        let Some(video) = xcom.path(keys::VIDEO)? else {
            info!(key = %self.on_complete.key, "No video, skipping upload");
            return Ok(None);
        };

        let post = CreatePost {
            post_body: post_body(xcom)?,
            medias: vec![video.display().to_string()],
            platform: self.platform.clone(),
        };

        let receipt = self
            .publisher
            .publish(self.on_complete.tenant_id, &post)
            .await?;
        info!(
            key = %self.on_complete.key,
            "Published on {} as {}", receipt.platform, receipt.post_id
        );

        let receipt = serde_json::to_value(&receipt).map_err(anyhow::Error::from)?;
        Ok(Some(XcomValue::Json(receipt)))
    }

    /// Records the item once a receipt is stored, outside the task timeout
    async fn on_success(&self, xcom: &Xcom) {
        if matches!(xcom.json(self.name()), Ok(Some(_))) {
            self.on_complete.complete().await;
        }
    }
}

/// Summary, story reference and hashtags; the headline stands in for a
/// missing summary
fn post_body(xcom: &Xcom) -> Result<String, TaskError> {
    let summary = match xcom.text(keys::SUMMARY)? {
        Some(summary) => Some(summary.clone()),
        None => xcom.article(keys::ARTICLE)?.map(|a| a.headline.clone()),
    };

    let mut body = summary.unwrap_or_default();
    if let Some(url) = xcom.text(keys::URL)? {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&format!("Story Ref: {}", url));
    }
    if let Some(tags) = xcom.tags(keys::TAGS)? {
        if !tags.is_empty() {
            body.push(' ');
            body.push_str(&tags.join(" "));
        }
    }

    Ok(body)
}
