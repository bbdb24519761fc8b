use std::{collections::HashSet, fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_timestamp;

pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub video_id: String,
}

impl VideoRequest {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
        }
    }

    /// Canonical watch URL for the requested video
    pub fn source_url(&self) -> String {
        format!("{}{}", WATCH_URL_BASE, self.video_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    AudioExtraction,
    LoudnessAnalysis,
    Transcription,
    FrameExtraction,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::AudioExtraction => "audio_extraction",
            Stage::LoudnessAnalysis => "loudness_analysis",
            Stage::Transcription => "transcription",
            Stage::FrameExtraction => "frame_extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Audio,
    Frame,
}

/// A file produced by one stage of a run and consumed by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl MediaArtifact {
    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Video,
        }
    }

    pub fn audio(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Audio,
        }
    }

    pub fn frame(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Frame,
        }
    }
}

/// Loudness of one whole-second window. Silent windows carry `f64::NEG_INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSample {
    pub window_index: u64,
    pub loudness_dbfs: f64,
}

impl LoudnessSample {
    pub fn timestamp(&self) -> String {
        format_timestamp(self.window_index)
    }
}

/// Loudest windows of an audio track, loudest first.
///
/// Holds at most [`PeakList::MAX_PEAKS`] samples with distinct window indexes.
/// Equal loudness is broken by the earlier window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakList(Vec<LoudnessSample>);

impl PeakList {
    pub const MAX_PEAKS: usize = 5;

    pub fn rank(mut samples: Vec<LoudnessSample>) -> Self {
        samples.sort_by(|a, b| {
            b.loudness_dbfs
                .total_cmp(&a.loudness_dbfs)
                .then(a.window_index.cmp(&b.window_index))
        });
        let mut seen = HashSet::new();
        samples.retain(|s| seen.insert(s.window_index));
        samples.truncate(Self::MAX_PEAKS);
        Self(samples)
    }

    pub fn loudest(&self) -> Option<&LoudnessSample> {
        self.0.first()
    }

    pub fn samples(&self) -> &[LoudnessSample] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn timestamps(&self) -> Vec<String> {
        self.0.iter().map(LoudnessSample::timestamp).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub video_id: String,
    pub source_url: String,
    pub transcription: String,
    pub wave_peaks: Vec<String>,
    pub frame_reference: Option<String>,
    pub produced_at: DateTime<Utc>,
    pub status: RunStatus,
}

/// The only thing a failed run hands back: which stage broke and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{stage} stage failed for {video_id}: {error}")]
pub struct PipelineFailure {
    pub video_id: String,
    pub stage: Stage,
    pub error: String,
    pub status: RunStatus,
}

impl PipelineFailure {
    pub fn new(video_id: impl Into<String>, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            stage,
            error: error.into(),
            status: RunStatus::Failure,
        }
    }
}
