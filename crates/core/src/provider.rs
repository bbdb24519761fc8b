use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechProvider {
    #[default]
    Openai,
    Groq,
    SelfHosted,
}

pub struct ProviderConfig {
    pub base_url: &'static str,
    pub model: &'static str,
    pub env_var: Option<&'static str>,
}

impl SpeechProvider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            SpeechProvider::Openai => ProviderConfig {
                base_url: "https://api.openai.com/v1",
                model: "whisper-1",
                env_var: Some("OPENAI_API_KEY"),
            },
            SpeechProvider::Groq => ProviderConfig {
                base_url: "https://api.groq.com/openai/v1",
                model: "whisper-large-v3",
                env_var: Some("GROQ_API_KEY"),
            },
            SpeechProvider::SelfHosted => ProviderConfig {
                base_url: "http://localhost:8000/v1",
                model: "Systran/faster-whisper-small",
                env_var: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeechProvider::Openai => "OpenAI",
            SpeechProvider::Groq => "Groq",
            SpeechProvider::SelfHosted => "self-hosted Whisper",
        }
    }

    /// Read this provider's API key from the process environment.
    ///
    /// Meant to be called once at startup; the key is then carried by
    /// [`TranscriberConfig`]. Providers without a credential yield `None`.
    pub fn api_key_from_env(&self) -> Result<Option<String>, ConfigError> {
        let Some(env_var) = self.config().env_var else {
            return Ok(None);
        };

        match std::env::var(env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ConfigError::MissingApiKey {
                env_var: env_var.to_string(),
            }),
        }
    }
}

/// Everything the HTTP transcriber needs, resolved up front.
#[derive(Clone, Debug)]
pub struct TranscriberConfig {
    pub provider: SpeechProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub timeout: Duration,
}

impl TranscriberConfig {
    pub fn for_provider(provider: SpeechProvider, api_key: Option<String>) -> Self {
        let config = provider.config();
        Self {
            provider,
            base_url: config.base_url.to_string(),
            model: config.model.to_string(),
            api_key,
            language: None,
            timeout: DEFAULT_TRANSCRIPTION_TIMEOUT,
        }
    }

    /// Full transcription endpoint derived from `base_url`
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        let trimmed = self.base_url.trim();
        let after_scheme = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .ok_or_else(|| ConfigError::InvalidEndpoint {
                url: trimmed.to_string(),
                reason: "must start with http:// or https://".to_string(),
            })?;

        if after_scheme.is_empty() || after_scheme.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint {
                url: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(format!(
            "{}/audio/transcriptions",
            trimmed.trim_end_matches('/')
        ))
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self::for_provider(SpeechProvider::default(), None)
    }
}
