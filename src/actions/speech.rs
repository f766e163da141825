use base64::Engine;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::SpeechSettings;

const STABILITY: f32 = 0.5;
const SIMILARITY_BOOST: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("ELEVENLABS_API_KEY is not defined")]
    MissingCredential,
    #[error("failed to reach voice API: {0}")]
    Request(#[from] reqwest::Error),
    #[error("voice API error ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("voice API returned non-audio content type {0:?}")]
    UnexpectedContentType(String),
}

/// Synthesized speech as a self-contained `data:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioResult {
    pub audio: String,
}

impl AudioResult {
    pub fn from_mpeg(bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            audio: format!("data:audio/mp3;base64,{encoded}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

pub struct SpeechSynthesizer {
    client: reqwest::Client,
    settings: SpeechSettings,
}

impl SpeechSynthesizer {
    pub fn new(settings: SpeechSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn synthesize(&self, text: &str) -> Result<AudioResult, SpeechError> {
        let audio = self.synthesize_bytes(text).await?;
        Ok(AudioResult::from_mpeg(&audio))
    }

    /// Raw MPEG bytes as returned by the voice API.
    pub async fn synthesize_bytes(&self, text: &str) -> Result<Bytes, SpeechError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SpeechError::MissingCredential)?;

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.voice_id
        );
        let body = SpeechRequest {
            text,
            model_id: &self.settings.model_id,
            voice_settings: VoiceSettings {
                stability: STABILITY,
                similarity_boost: SIMILARITY_BOOST,
            },
        };

        tracing::info!(chars = text.chars().count(), voice = %self.settings.voice_id, "synthesizing speech");

        let response = self
            .client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("audio/") {
            return Err(SpeechError::UnexpectedContentType(content_type));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }
}
