use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use xcavator_core::{Task, TaskError, Xcom, XcomValue, keys};

use super::remove_artifact;
use crate::service::SpeechSynthesizer;

/// Narrates the summary
///
/// Short summaries are not worth a reel and are skipped.
pub struct SynthesizeSpeechTask {
    speech: Arc<dyn SpeechSynthesizer>,
    min_chars: usize,
}

impl SynthesizeSpeechTask {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, min_chars: usize) -> Self {
        Self { speech, min_chars }
    }
}

#[async_trait]
impl Task for SynthesizeSpeechTask {
    fn name(&self) -> &str {
        "synthesize_speech"
    }

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
        let summary = match xcom.text(keys::SUMMARY)? {
            Some(summary) if summary.chars().count() > self.min_chars => summary.clone(),
            _ => {
                info!("Summary too short, skipping narration");
                return Ok(None);
            }
        };

        let audio = self.speech.synthesize(&summary).await?;
        xcom.insert(keys::AUDIO, audio);

        Ok(None)
    }

    async fn rollback(&self, xcom: &mut Xcom) -> Result<(), TaskError> {
        if let Some(audio) = xcom.path(keys::AUDIO)? {
            remove_artifact(audio).await?;
        }
        Ok(())
    }
}
