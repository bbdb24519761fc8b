//! Pipeline stages.
//!
//! Each stage that talks to the outside world (network, subprocesses, codecs)
//! sits behind a trait so the orchestrator can swap implementations, e.g. the
//! ffmpeg and symphonia audio extractors, or fakes in tests.

pub mod audio;
pub mod download;
pub mod frame;
pub mod loudness;
pub mod transcribe;

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    error::Result,
    scratch::RunScratch,
    types::{MediaArtifact, VideoRequest},
};

pub use audio::{FfmpegAudioExtractor, SymphoniaAudioExtractor};
pub use download::YtDlpDownloader;
pub use frame::FfmpegFrameExtractor;
pub use loudness::LoudnessAnalyzer;
#[cfg(feature = "local-whisper")]
pub use transcribe::LocalWhisperTranscriber;
pub use transcribe::HttpTranscriber;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the requested video into the run's scratch directory
    async fn download(&self, request: &VideoRequest, scratch: &RunScratch)
    -> Result<MediaArtifact>;
}

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write the audio track of `video` as a WAV file at `audio_path`
    async fn extract(&self, video: &MediaArtifact, audio_path: &Path) -> Result<MediaArtifact>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &MediaArtifact) -> Result<String>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Decode the frame shown at `offset_seconds` into a still image at `frame_path`
    async fn extract_frame(
        &self,
        video: &MediaArtifact,
        offset_seconds: u64,
        frame_path: &Path,
    ) -> Result<MediaArtifact>;
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to run {program}: {source}")]
pub(crate) struct CommandError {
    program: PathBuf,
    source: std::io::Error,
}

/// Run an external tool to completion.
///
/// The child is killed if the returned future is dropped, so a timeout or a
/// cancelled run never leaves a stray yt-dlp or ffmpeg behind.
pub(crate) async fn run_command(mut command: Command) -> std::result::Result<Output, CommandError> {
    let program = PathBuf::from(command.as_std().get_program());
    tracing::debug!(program = %program.display(), args = ?command.as_std().get_args().collect::<Vec<_>>(), "spawning");

    command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError { program, source })
}

/// Last few lines of a tool's stderr, enough to explain a failure
pub(crate) fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(5)..].join("\n");

    if tail.is_empty() {
        format!("exited with {}", output.status)
    } else {
        tail
    }
}
