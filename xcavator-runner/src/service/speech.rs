//! Speech synthesis
//!
//! Narrates a summary into a `.wav` file using the Piper binary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

/// Service trait for text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `text` and returns the path of the audio file
    async fn synthesize(&self, text: &str) -> Result<PathBuf>;
}

/// Piper text-to-speech via subprocess
pub struct PiperSpeech {
    binary: PathBuf,
    model: PathBuf,
    work_dir: PathBuf,
}

impl PiperSpeech {
    /// Creates a new Piper synthesizer
    ///
    /// # Arguments
    /// * `binary` - Path to the piper executable
    /// * `model` - Voice model; relative paths resolve next to the binary
    /// * `work_dir` - Directory audio files are written to
    pub fn new(binary: PathBuf, model: PathBuf, work_dir: PathBuf) -> Self {
        let model = if model.is_absolute() {
            model
        } else {
            binary
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|dir| dir.join(&model))
                .unwrap_or(model)
        };

        Self {
            binary,
            model,
            work_dir,
        }
    }

    pub fn model(&self) -> &Path {
        &self.model
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSpeech {
    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let output = self.work_dir.join(format!("{}.wav", Uuid::new_v4()));
        debug!("Synthesizing {} chars into {}", text.len(), output.display());

        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_file")
            .arg(&output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .context("Failed to pipe text to piper")?;
            // Dropping stdin closes it so piper starts synthesizing
        }

        let result = child
            .wait_with_output()
            .await
            .context("Failed to wait for piper")?;

        if !result.status.success() {
            anyhow::bail!(
                "piper exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        info!("Audio generated: {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_model_resolves_next_to_binary() {
        let speech = PiperSpeech::new(
            PathBuf::from("/opt/piper/piper"),
            PathBuf::from("en_US-ryan-high.onnx"),
            PathBuf::from("/tmp"),
        );
        assert_eq!(speech.model(), Path::new("/opt/piper/en_US-ryan-high.onnx"));
    }

    #[test]
    fn test_absolute_model_is_kept() {
        let speech = PiperSpeech::new(
            PathBuf::from("piper"),
            PathBuf::from("/models/voice.onnx"),
            PathBuf::from("/tmp"),
        );
        assert_eq!(speech.model(), Path::new("/models/voice.onnx"));
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let speech = PiperSpeech::new(
            dir.path().join("no-such-piper"),
            PathBuf::from("voice.onnx"),
            dir.path().to_path_buf(),
        );
        assert!(speech.synthesize("hello").await.is_err());
    }
}
