use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use xcavator_core::{Task, TaskError, Xcom, XcomValue, keys};

use super::remove_artifact;
use crate::service::VideoRenderer;

/// Renders the narration and article image into a reel
pub struct RenderVideoTask {
    renderer: Arc<dyn VideoRenderer>,
}

impl RenderVideoTask {
    pub fn new(renderer: Arc<dyn VideoRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Task for RenderVideoTask {
    fn name(&self) -> &str {
        "render_video"
    }

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
        let Some(audio) = xcom.path(keys::AUDIO)?.map(|p| p.to_path_buf()) else {
            info!("No audio, skipping video");
            return Ok(None);
        };

        let image = xcom
            .article(keys::ARTICLE)?
            .and_then(|article| article.media.clone());

        let video = self.renderer.render(&audio, image.as_deref()).await?;
        xcom.insert(keys::VIDEO, video);

        Ok(None)
    }

    async fn rollback(&self, xcom: &mut Xcom) -> Result<(), TaskError> {
        if let Some(video) = xcom.path(keys::VIDEO)? {
            remove_artifact(video).await?;
        }
        Ok(())
    }
}
