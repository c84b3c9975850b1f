//! Video rendering
//!
//! Turns narration audio plus an optional still image into a vertical reel
//! with ffmpeg.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reel resolution (9:16)
const REEL_WIDTH: u32 = 608;
const REEL_HEIGHT: u32 = 1080;

/// Service trait for rendering a video
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Renders a video from `audio` and an optional image (URL or local path)
    async fn render(&self, audio: &Path, image: Option<&str>) -> Result<PathBuf>;
}

/// ffmpeg still-image reel renderer
pub struct FfmpegRenderer {
    binary: PathBuf,
    work_dir: PathBuf,
    client: Client,
}

impl FfmpegRenderer {
    pub fn new(binary: PathBuf, work_dir: PathBuf, client: Client) -> Self {
        Self {
            binary,
            work_dir,
            client,
        }
    }

    /// Resolves the image to a local file
    ///
    /// Returns the path and whether it was downloaded (and should be removed
    /// after rendering). Unusable images yield `None`, which renders a black
    /// canvas instead.
    async fn prepare_image(&self, image: Option<&str>) -> Option<(PathBuf, bool)> {
        let image = image?.trim();

        if image.starts_with("http://") || image.starts_with("https://") {
            match self.download(image).await {
                Ok(path) => return Some((path, true)),
                Err(e) => {
                    warn!("Failed to download image {}: {:#}", image, e);
                    return None;
                }
            }
        }

        let path = PathBuf::from(image);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Some((path, false))
        } else {
            None
        }
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Image request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {} for {}", response.status(), url);
        }

        let bytes = response.bytes().await.context("Failed to read image")?;
        let path = self.work_dir.join(format!("{}.img", Uuid::new_v4()));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    async fn render(&self, audio: &Path, image: Option<&str>) -> Result<PathBuf> {
        if !tokio::fs::try_exists(audio).await.unwrap_or(false) {
            anyhow::bail!("audio file {} does not exist", audio.display());
        }

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let output = self.work_dir.join(format!("{}_reel.mp4", stem));

        let prepared = self.prepare_image(image).await;
        let args = ffmpeg_args(prepared.as_ref().map(|(p, _)| p.as_path()), audio, &output);
        debug!("Running {} {:?}", self.binary.display(), args);

        let result = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.binary.display()));

        // Intermediates are removed whatever the outcome
        remove_quietly(audio).await;
        if let Some((path, true)) = &prepared {
            remove_quietly(path).await;
        }

        let result = result?;
        if !result.status.success() {
            anyhow::bail!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        info!("Video generated: {}", output.display());
        Ok(output)
    }
}

/// Builds the ffmpeg command line
///
/// With an image: loop the still and letterbox it into the reel frame.
/// Without one: a black canvas of the reel size.
fn ffmpeg_args(image: Option<&Path>, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    match image {
        Some(image) => {
            args.extend(["-loop".into(), "1".into(), "-i".into()]);
            args.push(image.as_os_str().to_owned());
        }
        None => {
            args.extend(["-f".into(), "lavfi".into(), "-i".into()]);
            args.push(format!("color=c=black:s={}x{}", REEL_WIDTH, REEL_HEIGHT).into());
        }
    }

    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());

    args.push("-vf".into());
    args.push(
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = REEL_WIDTH,
            h = REEL_HEIGHT
        )
        .into(),
    );

    for arg in [
        "-c:v", "libx264", "-tune", "stillimage", "-c:a", "aac", "-b:a", "192k", "-pix_fmt",
        "yuv420p", "-shortest",
    ] {
        args.push(arg.into());
    }

    args.push(output.as_os_str().to_owned());
    args
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    } else {
        debug!("Removed {}", path.display());
    }
}
