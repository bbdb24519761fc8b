use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tokio::process::Command;

use crate::{
    error::{PipelineError, Result},
    stages::{AudioExtractor, run_command, stderr_tail},
    types::MediaArtifact,
};

/// Extracts audio with the ffmpeg executable.
pub struct FfmpegAudioExtractor {
    program: PathBuf,
    sample_rate: Option<u32>,
    channels: Option<u16>,
}

impl FfmpegAudioExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            sample_rate: None,
            channels: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: Option<u16>) -> Self {
        self.channels = channels;
        self
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video: &MediaArtifact, audio_path: &Path) -> Result<MediaArtifact> {
        let mut command = Command::new(&self.program);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&video.path)
            .arg("-vn")
            // fails outright when the container has no audio stream
            .arg("-map")
            .arg("0:a:0")
            .arg("-acodec")
            .arg("pcm_s16le");

        if let Some(rate) = self.sample_rate {
            command.arg("-ar").arg(rate.to_string());
        }
        if let Some(channels) = self.channels {
            command.arg("-ac").arg(channels.to_string());
        }
        command.arg(audio_path);

        let output = run_command(command)
            .await
            .map_err(|e| PipelineError::AudioExtractionFailed {
                video_path: video.path.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PipelineError::AudioExtractionFailed {
                video_path: video.path.clone(),
                reason: stderr_tail(&output),
            });
        }

        Ok(MediaArtifact::audio(audio_path))
    }
}

/// Extracts audio in-process: symphonia decodes, hound writes 16-bit PCM.
#[derive(Default)]
pub struct SymphoniaAudioExtractor;

impl SymphoniaAudioExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioExtractor for SymphoniaAudioExtractor {
    async fn extract(&self, video: &MediaArtifact, audio_path: &Path) -> Result<MediaArtifact> {
        let video_path = video.path.clone();
        let target = audio_path.to_path_buf();

        let decoded = tokio::task::spawn_blocking(move || decode_to_wav(&video_path, &target))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);

        match decoded {
            Ok(frames) => {
                tracing::debug!(frames, path = %audio_path.display(), "audio decoded");
                Ok(MediaArtifact::audio(audio_path))
            }
            Err(reason) => Err(PipelineError::AudioExtractionFailed {
                video_path: video.path.clone(),
                reason,
            }),
        }
    }
}

/// Decode the first audio track of `video_path` into a 16-bit WAV. Returns the number of frames written.
fn decode_to_wav(video_path: &Path, audio_path: &Path) -> std::result::Result<u64, String> {
    let file = File::open(video_path).map_err(|e| format!("open: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = video_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("detect format: {}", e))?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| "no audio track found".to_string())?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| format!("codec: {}", e))?;

    let mut writer: Option<(hound::WavWriter<BufWriter<File>>, WavLayout)> = None;
    let mut frames_written: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(format!("decode: {}", e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }

        let layout = WavLayout {
            sample_rate: spec.rate,
            channels: spec.channels.count() as u16,
        };
        if writer.is_none() {
            writer = Some((create_wav(audio_path, layout)?, layout));
        }
        let Some((w, expected)) = writer.as_mut() else {
            continue;
        };
        expected.check(&layout)?;

        let mut sample_buf = SampleBuffer::<i16>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        for &sample in sample_buf.samples() {
            w.write_sample(sample).map_err(|e| format!("write: {}", e))?;
        }
        frames_written += num_frames as u64;
    }

    let writer = match writer {
        Some((w, _)) => w,
        // a track that decodes to nothing still yields a valid, empty WAV
        None => {
            let rate = codec_params
                .sample_rate
                .ok_or_else(|| "unknown sample rate".to_string())?;
            let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1) as u16;
            create_wav(
                audio_path,
                WavLayout {
                    sample_rate: rate,
                    channels,
                },
            )?
        }
    };
    writer.finalize().map_err(|e| format!("finalize: {}", e))?;

    Ok(frames_written)
}

/// Rate and channel count a WAV file is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavLayout {
    sample_rate: u32,
    channels: u16,
}

impl WavLayout {
    /// A WAV has one layout; a stream that changes it mid-way cannot be written
    fn check(&self, decoded: &WavLayout) -> std::result::Result<(), String> {
        if self == decoded {
            return Ok(());
        }
        Err(format!(
            "audio format changed mid-stream: {} Hz x {} channels became {} Hz x {} channels",
            self.sample_rate, self.channels, decoded.sample_rate, decoded.channels
        ))
    }
}

fn create_wav(
    path: &Path,
    layout: WavLayout,
) -> std::result::Result<hound::WavWriter<BufWriter<File>>, String> {
    let spec = hound::WavSpec {
        channels: layout.channels,
        sample_rate: layout.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    hound::WavWriter::create(path, spec).map_err(|e| format!("create {}: {}", path.display(), e))
}
