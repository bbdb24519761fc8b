use std::path::PathBuf;
use thiserror::Error;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Download failed for {video_id}: {reason}")]
    DownloadFailed { video_id: String, reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    AudioExtractionFailed { video_path: PathBuf, reason: String },

    #[error("Loudness analysis failed for {audio_path}: {reason}")]
    AnalysisFailed { audio_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptFailed { audio_path: PathBuf, reason: String },

    #[error("Frame extraction failed for {video_path} at {offset_seconds}s: {reason}")]
    FrameExtractionFailed {
        video_path: PathBuf,
        offset_seconds: u64,
        reason: String,
    },
}

impl PipelineError {
    /// The stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::DownloadFailed { .. } => Stage::Download,
            PipelineError::AudioExtractionFailed { .. } => Stage::AudioExtraction,
            PipelineError::AnalysisFailed { .. } => Stage::LoudnessAnalysis,
            PipelineError::TranscriptFailed { .. } => Stage::Transcription,
            PipelineError::FrameExtractionFailed { .. } => Stage::FrameExtraction,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("Invalid transcription endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Raised while removing a run's artifacts. Logged, never returned to the caller.
#[derive(Error, Debug)]
#[error("Failed to remove {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    pub source: std::io::Error,
}
