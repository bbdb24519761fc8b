#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use peakframe_core::{
    AudioExtractor, Downloader, FrameExtractor, MediaArtifact, PipelineConfig, PipelineError,
    Result, RunScratch, Transcriber, VideoRequest,
};

pub struct Workspace {
    pub root: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.path().join("frames")
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            scratch_root: self.scratch_root(),
            frames_dir: self.frames_dir(),
            ..PipelineConfig::default()
        }
    }

    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        entries(&self.scratch_root())
    }

    pub fn frame_files(&self) -> Vec<PathBuf> {
        entries(&self.frames_dir())
    }
}

pub fn entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(iter) => iter.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::write_wav;

pub const SAMPLE_RATE: u32 = 8_000;

/// Writes a placeholder video into the run's scratch directory, or leaves a
/// partial download behind and never finishes
pub enum FakeDownloader {
    Finish,
    Hang,
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, _request: &VideoRequest, scratch: &RunScratch) -> Result<MediaArtifact> {
        match self {
            FakeDownloader::Finish => {
                let path = scratch.run_dir().join("video.mp4");
                tokio::fs::write(&path, b"not really a video").await.unwrap();
                Ok(MediaArtifact::video(path))
            }
            FakeDownloader::Hang => {
                let partial = scratch.run_dir().join("video.mp4.part");
                tokio::fs::write(&partial, b"half a video").await.unwrap();
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(MediaArtifact::video(partial))
            }
        }
    }
}

pub enum AudioOutput {
    /// Square-wave seconds at the given dBFS plus sub-second tail frames
    Wav { seconds: Vec<f64>, tail_frames: u32 },
    /// Bytes no WAV reader accepts
    Garbage,
    /// A truncated file, then an extraction error
    Fail,
}

pub struct FakeAudio {
    pub output: AudioOutput,
    pub calls: AtomicUsize,
}

impl FakeAudio {
    pub fn new(seconds: &[f64]) -> Self {
        Self::with_output(AudioOutput::Wav {
            seconds: seconds.to_vec(),
            tail_frames: 0,
        })
    }

    pub fn with_output(output: AudioOutput) -> Self {
        Self {
            output,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_tail(mut self, frames: u32) -> Self {
        if let AudioOutput::Wav { tail_frames, .. } = &mut self.output {
            *tail_frames = frames;
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioExtractor for FakeAudio {
    async fn extract(&self, video: &MediaArtifact, audio_path: &Path) -> Result<MediaArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.output {
            AudioOutput::Wav {
                seconds,
                tail_frames,
            } => {
                let seconds: Vec<Option<f64>> = seconds.iter().copied().map(Some).collect();
                write_wav(audio_path, SAMPLE_RATE, 1, &seconds, *tail_frames);
            }
            AudioOutput::Garbage => std::fs::write(audio_path, b"this is not a wav file").unwrap(),
            AudioOutput::Fail => {
                std::fs::write(audio_path, b"RIFF").unwrap();
                return Err(PipelineError::AudioExtractionFailed {
                    video_path: video.path.clone(),
                    reason: "Stream map '0:a:0' matches no streams".to_string(),
                });
            }
        }

        Ok(MediaArtifact::audio(audio_path))
    }
}

pub enum FakeTranscriber {
    Text(String),
    Fail(String),
    Hang,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &MediaArtifact) -> Result<String> {
        match self {
            FakeTranscriber::Text(text) => Ok(text.clone()),
            FakeTranscriber::Fail(reason) => Err(PipelineError::TranscriptFailed {
                audio_path: audio.path.clone(),
                reason: reason.clone(),
            }),
            FakeTranscriber::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

/// Records requested offsets; optionally leaves a partial file behind and fails
#[derive(Default)]
pub struct FakeFrames {
    pub fail: bool,
    pub offsets: Mutex<Vec<u64>>,
}

impl FakeFrames {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameExtractor for FakeFrames {
    async fn extract_frame(
        &self,
        video: &MediaArtifact,
        offset_seconds: u64,
        frame_path: &Path,
    ) -> Result<MediaArtifact> {
        self.offsets.lock().unwrap().push(offset_seconds);
        tokio::fs::write(frame_path, b"JFIF").await.unwrap();

        if self.fail {
            return Err(PipelineError::FrameExtractionFailed {
                video_path: video.path.clone(),
                offset_seconds,
                reason: "decoder crashed".to_string(),
            });
        }
        Ok(MediaArtifact::frame(frame_path))
    }
}
