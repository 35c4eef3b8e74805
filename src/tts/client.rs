//! `VoiceSynthesizer` trait and the ElevenLabs-compatible REST client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{TtsConfig, VoiceSettings};

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Errors from the voice-synthesis service.  All of them are connectivity
/// problems from the user's point of view.
#[derive(Debug, Error)]
pub enum TtsError {
    /// No API key could be resolved.
    #[error("voice synthesis API key is not configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("voice synthesis request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("voice synthesis timed out")]
    Timeout,

    /// Non-2xx answer; carries the remote status and body text.
    #[error("voice synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A JSON catalog could not be parsed.
    #[error("failed to parse voice synthesis response: {0}")]
    Parse(String),

    /// 2xx answer with no audio in it.
    #[error("voice synthesis returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Voice catalog
// ---------------------------------------------------------------------------

/// One entry of the provider's voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceCatalog {
    voices: Vec<Voice>,
}

// ---------------------------------------------------------------------------
// VoiceSynthesizer trait
// ---------------------------------------------------------------------------

/// Text-to-speech service.
///
/// `voice_id` and `settings` override the configured defaults for one call.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Synthesize `text`; returns encoded audio bytes.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
        settings: Option<VoiceSettings>,
    ) -> Result<Vec<u8>, TtsError>;

    /// `true` when the service is reachable and accepts the key.
    async fn test_connection(&self) -> bool;

    /// The provider's voice catalog.
    async fn available_voices(&self) -> Result<Vec<Voice>, TtsError>;
}

// ---------------------------------------------------------------------------
// ElevenLabsClient
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs-compatible synthesis client.
///
/// All connection details come from [`TtsConfig`]; the key is resolved once
/// at construction (environment first, then the saved value).
pub struct ElevenLabsClient {
    client: reqwest::Client,
    config: TtsConfig,
    api_key: Option<String>,
}

impl ElevenLabsClient {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.resolve_api_key(),
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn key(&self) -> Result<&str, TtsError> {
        self.api_key.as_deref().ok_or(TtsError::MissingApiKey)
    }

    fn synthesis_url(&self, voice_id: Option<&str>) -> String {
        let voice = voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.config.voice_id);
        self.url(&format!("/v1/text-to-speech/{voice}"))
    }

    fn synthesis_request<'a>(
        &'a self,
        text: &'a str,
        settings: Option<VoiceSettings>,
    ) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: settings.unwrap_or(self.config.voice).clamped(),
        }
    }
}

async fn status_error(response: reqwest::Response) -> TtsError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TtsError::Status { status, body }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
        settings: Option<VoiceSettings>,
    ) -> Result<Vec<u8>, TtsError> {
        let key = self.key()?;
        let response = self
            .client
            .post(self.synthesis_url(voice_id))
            .header("xi-api-key", key)
            .header("Accept", "audio/mpeg")
            .json(&self.synthesis_request(text, settings))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        log::debug!("tts: {} bytes for {} chars", audio.len(), text.len());
        Ok(audio.to_vec())
    }

    async fn test_connection(&self) -> bool {
        let Ok(key) = self.key() else {
            return false;
        };
        match self
            .client
            .get(self.url("/v1/user"))
            .header("xi-api-key", key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::warn!("tts: connection test failed: {e}");
                false
            }
        }
    }

    async fn available_voices(&self) -> Result<Vec<Voice>, TtsError> {
        let key = self.key()?;
        let response = self
            .client
            .get(self.url("/v1/voices"))
            .header("xi-api-key", key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let catalog: VoiceCatalog = response
            .json()
            .await
            .map_err(|e| TtsError::Parse(e.to_string()))?;
        Ok(catalog.voices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
