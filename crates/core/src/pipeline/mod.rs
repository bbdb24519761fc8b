//! Runs the stages for one video in dependency order.
//!
//! ```text
//! download -> extract audio -> { loudness, transcription } -> frame -> result
//! ```
//!
//! The orchestrator owns every artifact a run creates. A run ends either with
//! a complete [`VideoResult`] or with a single [`PipelineFailure`]; intermediate
//! files are gone in both cases and only the frame of a successful run is kept.

mod artifacts;
pub mod state;

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use tracing::Instrument;

use crate::{
    config::{AudioBackend, PipelineConfig},
    error::{ConfigError, PipelineError, Result},
    scratch::RunScratch,
    stages::{
        AudioExtractor, Downloader, FfmpegAudioExtractor, FfmpegFrameExtractor, FrameExtractor,
        HttpTranscriber, LoudnessAnalyzer, SymphoniaAudioExtractor, Transcriber, YtDlpDownloader,
    },
    types::{ArtifactKind, MediaArtifact, PipelineFailure, RunStatus, VideoRequest, VideoResult},
};

use artifacts::ArtifactLedger;
pub use state::{RunObserver, RunState};
use state::RunTracker;

pub struct Pipeline {
    config: PipelineConfig,
    downloader: Arc<dyn Downloader>,
    audio_extractor: Arc<dyn AudioExtractor>,
    analyzer: LoudnessAnalyzer,
    transcriber: Arc<dyn Transcriber>,
    frame_extractor: Arc<dyn FrameExtractor>,
}

/// Assembles a [`Pipeline`]. Stages left unset are built from the config.
pub struct PipelineBuilder {
    config: PipelineConfig,
    downloader: Option<Arc<dyn Downloader>>,
    audio_extractor: Option<Arc<dyn AudioExtractor>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    frame_extractor: Option<Arc<dyn FrameExtractor>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            downloader: None,
            audio_extractor: None,
            transcriber: None,
            frame_extractor: None,
        }
    }

    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn audio_extractor(mut self, audio_extractor: Arc<dyn AudioExtractor>) -> Self {
        self.audio_extractor = Some(audio_extractor);
        self
    }

    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn frame_extractor(mut self, frame_extractor: Arc<dyn FrameExtractor>) -> Self {
        self.frame_extractor = Some(frame_extractor);
        self
    }

    pub fn build(self) -> std::result::Result<Pipeline, ConfigError> {
        let config = self.config;
        let tools = &config.tools;

        let downloader = self
            .downloader
            .unwrap_or_else(|| Arc::new(YtDlpDownloader::new(&tools.yt_dlp)));

        let audio_extractor = self.audio_extractor.unwrap_or_else(|| match config.audio_backend {
            AudioBackend::Ffmpeg => Arc::new(
                FfmpegAudioExtractor::new(&tools.ffmpeg)
                    .with_sample_rate(config.audio_sample_rate)
                    .with_channels(config.audio_channels),
            ),
            AudioBackend::Library => Arc::new(SymphoniaAudioExtractor::new()),
        });

        let transcriber = match self.transcriber {
            Some(t) => t,
            None => Arc::new(HttpTranscriber::new(&config.transcriber)?),
        };

        let frame_extractor = self
            .frame_extractor
            .unwrap_or_else(|| Arc::new(FfmpegFrameExtractor::new(&tools.ffmpeg, &tools.ffprobe)));

        Ok(Pipeline {
            config,
            downloader,
            audio_extractor,
            analyzer: LoudnessAnalyzer::new(),
            transcriber,
            frame_extractor,
        })
    }
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn from_config(config: PipelineConfig) -> std::result::Result<Self, ConfigError> {
        PipelineBuilder::new(config).build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, request: &VideoRequest) -> std::result::Result<VideoResult, PipelineFailure> {
        self.run_observed(request, &|_: &RunState| {}).await
    }

    /// Run the pipeline, reporting every state change to `observer`.
    ///
    /// Dropping the returned future cancels the run; whatever artifacts exist
    /// at that point are removed.
    pub async fn run_observed(
        &self,
        request: &VideoRequest,
        observer: RunObserver<'_>,
    ) -> std::result::Result<VideoResult, PipelineFailure> {
        let scratch = RunScratch::new(&self.config.scratch_root, &self.config.frames_dir);
        let span = tracing::info_span!("run", video_id = %request.video_id, token = %scratch.token());

        async {
            let mut ledger = ArtifactLedger::new();
            let mut tracker = RunTracker::new(&request.video_id, observer);

            let outcome = self
                .execute(request, &scratch, &mut ledger, &mut tracker)
                .await;

            match outcome {
                Ok(result) => {
                    ledger.release(ArtifactKind::Frame);
                    ledger.cleanup().await;
                    tracker.advance(RunState::Completed);
                    Ok(result)
                }
                Err(err) => {
                    let stage = err.stage();
                    let cause = err.to_string();
                    tracker.advance(RunState::Failed {
                        stage,
                        cause: cause.clone(),
                    });
                    ledger.cleanup().await;
                    Err(PipelineFailure::new(&request.video_id, stage, cause))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &VideoRequest,
        scratch: &RunScratch,
        ledger: &mut ArtifactLedger,
        tracker: &mut RunTracker<'_>,
    ) -> Result<VideoResult> {
        let video_id = &request.video_id;

        tokio::fs::create_dir_all(scratch.run_dir())
            .await
            .map_err(|e| PipelineError::DownloadFailed {
                video_id: video_id.clone(),
                reason: format!("create scratch dir {}: {}", scratch.run_dir().display(), e),
            })?;
        ledger.track_dir(scratch.run_dir().to_path_buf());

        let video = bounded(
            self.config.download_timeout,
            self.downloader.download(request, scratch),
            || PipelineError::DownloadFailed {
                video_id: video_id.clone(),
                reason: format!("timed out after {:?}", self.config.download_timeout),
            },
        )
        .await?;
        ledger.track(video.clone());
        tracker.advance(RunState::Downloaded);

        let audio_path = scratch.audio_path();
        ledger.track(MediaArtifact::audio(&audio_path));
        let audio = self.audio_extractor.extract(&video, &audio_path).await?;
        ledger.track(audio.clone());
        tracker.advance(RunState::AudioExtracted);

        let transcription_timeout = self.config.transcriber.timeout;
        let (peaks, transcription) = tokio::try_join!(
            self.analyzer.analyze(&audio),
            bounded(
                transcription_timeout,
                self.transcriber.transcribe(&audio),
                || PipelineError::TranscriptFailed {
                    audio_path: audio.path.clone(),
                    reason: format!("timed out after {:?}", transcription_timeout),
                },
            ),
        )?;
        tracker.advance(RunState::AudioAnalyzed);

        let frame_reference = match peaks.loudest() {
            Some(peak) => {
                let frame_path = scratch.frame_path();
                tokio::fs::create_dir_all(&self.config.frames_dir)
                    .await
                    .map_err(|e| PipelineError::FrameExtractionFailed {
                        video_path: video.path.clone(),
                        offset_seconds: peak.window_index,
                        reason: format!(
                            "create frames dir {}: {}",
                            self.config.frames_dir.display(),
                            e
                        ),
                    })?;

                ledger.track(MediaArtifact::frame(&frame_path));
                let frame = self
                    .frame_extractor
                    .extract_frame(&video, peak.window_index, &frame_path)
                    .await?;
                ledger.track(frame.clone());
                tracker.advance(RunState::FrameExtracted);

                let file_name = frame
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(self.config.frame_reference(&file_name))
            }
            None => {
                tracing::info!("no whole second of audio, skipping frame extraction");
                None
            }
        };

        Ok(VideoResult {
            video_id: video_id.clone(),
            source_url: request.source_url(),
            transcription,
            wave_peaks: peaks.timestamps(),
            frame_reference,
            produced_at: Utc::now(),
            status: RunStatus::Success,
        })
    }
}

/// Await `fut`, giving up with `on_timeout()` once `limit` has passed
async fn bounded<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> PipelineError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
