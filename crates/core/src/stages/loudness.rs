use std::path::Path;

use crate::{
    error::{PipelineError, Result},
    types::{LoudnessSample, MediaArtifact, PeakList},
};

/// Loudness in dBFS of a window with the given RMS. Silence is `-inf`.
pub fn dbfs(rms: f64, full_scale: f64) -> f64 {
    if rms <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * (rms / full_scale).log10()
    }
}

/// Measure every whole-second window of a WAV file.
///
/// RMS runs over all interleaved samples of all channels in the window. A
/// trailing partial second is dropped.
pub fn measure_windows(path: &Path) -> std::result::Result<Vec<LoudnessSample>, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let window_len = spec.sample_rate as usize * spec.channels as usize;
    if window_len == 0 {
        return Err(hound::Error::FormatError("zero sample rate or channel count"));
    }

    match spec.sample_format {
        hound::SampleFormat::Float => windows(
            reader.samples::<f32>().map(|s| s.map(f64::from)),
            window_len,
            1.0,
        ),
        hound::SampleFormat::Int => windows(
            reader.samples::<i32>().map(|s| s.map(f64::from)),
            window_len,
            2f64.powi(spec.bits_per_sample as i32 - 1),
        ),
    }
}

fn windows<I>(
    samples: I,
    window_len: usize,
    full_scale: f64,
) -> std::result::Result<Vec<LoudnessSample>, hound::Error>
where
    I: Iterator<Item = std::result::Result<f64, hound::Error>>,
{
    let mut out = Vec::new();
    let mut sum_squares = 0.0;
    let mut count = 0;

    for sample in samples {
        let sample = sample?;
        sum_squares += sample * sample;
        count += 1;

        if count == window_len {
            let rms = (sum_squares / window_len as f64).sqrt();
            out.push(LoudnessSample {
                window_index: out.len() as u64,
                loudness_dbfs: dbfs(rms, full_scale),
            });
            sum_squares = 0.0;
            count = 0;
        }
    }

    Ok(out)
}

/// Ranks the one-second windows of an audio artifact by loudness.
#[derive(Debug, Default, Clone)]
pub struct LoudnessAnalyzer;

impl LoudnessAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub async fn analyze(&self, audio: &MediaArtifact) -> Result<PeakList> {
        let path = audio.path.clone();
        let measured = tokio::task::spawn_blocking(move || measure_windows(&path))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        let windows = measured.map_err(|reason| PipelineError::AnalysisFailed {
            audio_path: audio.path.clone(),
            reason,
        })?;

        let seconds = windows.len();
        let peaks = PeakList::rank(windows);
        tracing::debug!(seconds, peaks = ?peaks.timestamps(), "loudness analyzed");

        Ok(peaks)
    }
}
