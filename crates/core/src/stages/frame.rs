use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};

use crate::{
    error::{PipelineError, Result},
    stages::{FrameExtractor, run_command, stderr_tail},
    types::MediaArtifact,
};

/// Grabs a still with ffmpeg after checking the offset against ffprobe's duration.
pub struct FfmpegFrameExtractor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Container duration in seconds
    async fn video_duration(&self, video_path: &Path) -> std::result::Result<f64, String> {
        let mut command = Command::new(&self.ffprobe);
        command
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(video_path);

        let output = run_command(command).await.map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!("ffprobe: {}", stderr_tail(&output)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = stdout.trim();
        value
            .parse::<f64>()
            .map_err(|_| format!("ffprobe reported an unreadable duration {:?}", value))
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(
        &self,
        video: &MediaArtifact,
        offset_seconds: u64,
        frame_path: &Path,
    ) -> Result<MediaArtifact> {
        let failed = |reason: String| PipelineError::FrameExtractionFailed {
            video_path: video.path.clone(),
            offset_seconds,
            reason,
        };

        let duration = self.video_duration(&video.path).await.map_err(failed)?;
        if offset_seconds as f64 >= duration {
            return Err(failed(format!(
                "offset is past the end of the media ({:.3}s)",
                duration
            )));
        }

        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(offset_seconds.to_string())
            .arg("-i")
            .arg(&video.path)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg("-f")
            .arg("image2")
            .arg(frame_path);

        let output = run_command(command)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(stderr_tail(&output)));
        }

        let written = fs::metadata(frame_path).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(failed("ffmpeg produced no image".to_string()));
        }

        Ok(MediaArtifact::frame(frame_path))
    }
}
