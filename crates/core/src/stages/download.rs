use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{fs, process::Command};

use crate::{
    error::{PipelineError, Result},
    scratch::RunScratch,
    stages::{Downloader, run_command, stderr_tail},
    types::{MediaArtifact, VideoRequest},
};

/// mp4/m4a first so ffmpeg and symphonia can both read the result, then any mp4, then anything
pub const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

pub struct YtDlpDownloader {
    program: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Video ids are URL-safe base64: letters, digits, `-` and `_`
pub fn validate_video_id(video_id: &str) -> std::result::Result<(), String> {
    if video_id.is_empty() {
        return Err("video id is empty".to_string());
    }

    if let Some(bad) = video_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(format!("invalid character {:?} in video id", bad));
    }

    Ok(())
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(
        &self,
        request: &VideoRequest,
        scratch: &RunScratch,
    ) -> Result<MediaArtifact> {
        let failed = |reason: String| PipelineError::DownloadFailed {
            video_id: request.video_id.clone(),
            reason,
        };

        validate_video_id(&request.video_id).map_err(failed)?;

        let url = request.source_url();
        let mut command = Command::new(&self.program);
        command
            .arg(&url)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--extractor-args")
            .arg("youtube:player_client=android,web")
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(scratch.video_template());

        let output = run_command(command)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            return Err(failed(stderr_tail(&output)));
        }

        let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
        let Some(filepath) = stdout_str.lines().map(str::trim).rfind(|l| !l.is_empty()) else {
            return Err(failed("yt-dlp did not report an output file".to_string()));
        };

        let path = PathBuf::from(filepath);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(failed(format!(
                "yt-dlp reported {} but the file does not exist",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "video downloaded");
        Ok(MediaArtifact::video(path))
    }
}
