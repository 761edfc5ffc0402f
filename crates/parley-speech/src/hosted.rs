//! Hosted speech-to-text over an OpenAI-compatible transcription API.

use std::time::Duration;

use parley_core::config::TranscriptionConfig;
use parley_core::error::ParleyError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::wav::pcm_f32_to_wav;
use crate::{TranscriptionResult, TranscriptionService};

/// Client for `POST {base_url}/audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct HostedTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl HostedTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Transcription(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            language: String::new(),
        })
    }

    /// Build from config with an already resolved API key.
    pub fn from_config(config: &TranscriptionConfig, api_key: String) -> Result<Self, ParleyError> {
        let mut transcriber = Self::new(
            config.base_url.clone(),
            api_key,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        transcriber.language = config.language.clone();
        Ok(transcriber)
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

impl TranscriptionService for HostedTranscriber {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, ParleyError> {
        if audio_data.is_empty() || sample_rate == 0 {
            return Ok(TranscriptionResult {
                text: String::new(),
                duration_secs: 0.0,
            });
        }
        let duration_secs = audio_data.len() as f32 / sample_rate as f32;

        let part = Part::bytes(pcm_f32_to_wav(audio_data, sample_rate))
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ParleyError::Transcription(e.to_string()))?;
        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ParleyError::Transcription(format!("request timed out: {}", e))
                } else {
                    ParleyError::Transcription(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ParleyError::Transcription(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ParleyError::Transcription(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| ParleyError::Transcription(format!("malformed response: {}", e)))?;

        tracing::debug!(duration_secs, chars = parsed.text.len(), "Audio transcribed");
        Ok(TranscriptionResult {
            text: parsed.text.trim().to_string(),
            duration_secs,
        })
    }
}
