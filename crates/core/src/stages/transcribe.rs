use async_trait::async_trait;
use reqwest::{StatusCode, multipart};
use serde::Deserialize;
use tokio::fs;

use crate::{
    error::{ConfigError, PipelineError, Result},
    provider::TranscriberConfig,
    stages::Transcriber,
    types::MediaArtifact,
};

/// Response structure for OpenAI-compatible APIs
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text over an OpenAI-compatible `/audio/transcriptions` endpoint.
///
/// The API key is handed over at construction; nothing is read from the
/// environment per request.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    language: Option<String>,
    timeout_secs: u64,
}

impl HttpTranscriber {
    pub fn new(config: &TranscriberConfig) -> std::result::Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn failed(audio: &MediaArtifact, reason: impl Into<String>) -> PipelineError {
        PipelineError::TranscriptFailed {
            audio_path: audio.path.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &MediaArtifact) -> Result<String> {
        let audio_data = fs::read(&audio.path)
            .await
            .map_err(|e| Self::failed(audio, format!("read audio: {}", e)))?;

        let file_name = audio
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let file_part = multipart::Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| Self::failed(audio, format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "sending audio for transcription");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Self::failed(
                    audio,
                    format!("request timed out after {}s", self.timeout_secs),
                )
            } else {
                Self::failed(audio, format!("request: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("authentication rejected ({}): {}", status, body)
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    format!("quota or rate limit exceeded ({}): {}", status, body)
                }
                _ => format!("API error ({}): {}", status, body),
            };
            return Err(Self::failed(audio, reason));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::failed(audio, format!("body: {}", e)))?;
        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| Self::failed(audio, format!("invalid API response: {}", e)))?;

        tracing::info!(chars = parsed.text.len(), "transcription completed");
        Ok(parsed.text)
    }
}

/// In-process Whisper via whisper.cpp. Expects 16 kHz mono 16-bit audio, so
/// pair it with an ffmpeg extractor configured for `-ar 16000 -ac 1`.
#[cfg(feature = "local-whisper")]
pub struct LocalWhisperTranscriber {
    model_path: std::path::PathBuf,
    language: Option<String>,
}

#[cfg(feature = "local-whisper")]
impl LocalWhisperTranscriber {
    pub fn new(model_path: impl Into<std::path::PathBuf>, language: Option<String>) -> Self {
        Self {
            model_path: model_path.into(),
            language,
        }
    }

    fn run(
        model_path: &std::path::Path,
        audio_path: &std::path::Path,
        language: Option<&str>,
    ) -> std::result::Result<String, String> {
        use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

        let mut reader = hound::WavReader::open(audio_path).map_err(|e| format!("read audio: {}", e))?;
        let spec = reader.spec();
        if spec.sample_rate != 16000 || spec.channels != 1 {
            return Err(format!(
                "expected 16 kHz mono audio, got {} Hz with {} channels",
                spec.sample_rate, spec.channels
            ));
        }

        let samples: Vec<f32> = reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("read audio: {}", e))?;

        let model_path_str = model_path
            .to_str()
            .ok_or_else(|| format!("model path {} is not UTF-8", model_path.display()))?;
        let ctx = WhisperContext::new_with_params(model_path_str, WhisperContextParameters::default())
            .map_err(|e| format!("load model: {}", e))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
        params.set_language(language);

        let mut state = ctx.create_state().map_err(|e| format!("create state: {}", e))?;
        state
            .full(params, &samples)
            .map_err(|e| format!("run model: {}", e))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(seg_text) = segment.to_str() {
                text.push_str(seg_text);
            }
        }

        Ok(text)
    }
}

#[cfg(feature = "local-whisper")]
#[async_trait]
impl Transcriber for LocalWhisperTranscriber {
    async fn transcribe(&self, audio: &MediaArtifact) -> Result<String> {
        let model_path = self.model_path.clone();
        let audio_path = audio.path.clone();
        let language = self.language.clone();

        tokio::task::spawn_blocking(move || Self::run(&model_path, &audio_path, language.as_deref()))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r)
            .map_err(|reason| PipelineError::TranscriptFailed {
                audio_path: audio.path.clone(),
                reason,
            })
    }
}
