use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    provider::TranscriberConfig,
    scratch::{get_default_frames_dir, get_root_scratch_dir},
};

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_FRAME_URL_PREFIX: &str = "/frames";

/// 16 kHz mono PCM: still exact for dBFS, and about 1.9 MB per minute, which
/// keeps uploads under the 25 MB cap of hosted transcription APIs for
/// videos up to roughly 13 minutes.
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_AUDIO_CHANNELS: u16 = 1;

/// How the audio track is pulled out of the downloaded container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// Shell out to ffmpeg
    #[default]
    Ffmpeg,
    /// Decode in-process with symphonia
    Library,
}

#[derive(Clone, Debug)]
pub struct ToolPaths {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            yt_dlp: PathBuf::from("yt-dlp"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub scratch_root: PathBuf,
    pub frames_dir: PathBuf,
    pub frame_url_prefix: String,
    pub audio_backend: AudioBackend,
    /// Resample the extracted audio (ffmpeg backend only); `None` keeps the source rate
    pub audio_sample_rate: Option<u32>,
    /// Downmix the extracted audio (ffmpeg backend only); `None` keeps the source layout
    pub audio_channels: Option<u16>,
    pub download_timeout: Duration,
    pub tools: ToolPaths,
    pub transcriber: TranscriberConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_root: get_root_scratch_dir(),
            frames_dir: get_default_frames_dir(),
            frame_url_prefix: DEFAULT_FRAME_URL_PREFIX.to_string(),
            audio_backend: AudioBackend::default(),
            audio_sample_rate: Some(DEFAULT_AUDIO_SAMPLE_RATE),
            audio_channels: Some(DEFAULT_AUDIO_CHANNELS),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            tools: ToolPaths::default(),
            transcriber: TranscriberConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Public reference for a frame file name under the configured prefix
    pub fn frame_reference(&self, file_name: &str) -> String {
        format!("{}/{}", self.frame_url_prefix.trim_end_matches('/'), file_name)
    }
}
