//! HTTP speech-synthesis provider.
//!
//! POSTs a JSON request and decodes the first base64 clip of
//! `{ "request_id": .., "audios": [..] }`.

use crate::config::SynthesisConfig;
use crate::pipeline::error::StageError;
use crate::tts::provider::{SpeechSynthesizer, VoiceConfig};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    target_language_code: &'a str,
    speaker: &'a str,
    pitch: f32,
    pace: f32,
    loudness: f32,
    /// The API expects the rate as a string.
    speech_sample_rate: String,
    enable_preprocessing: bool,
    model: &'a str,
    output_audio_codec: &'a str,
}

impl<'a> SynthesisRequest<'a> {
    fn new(text: &'a str, voice: &'a VoiceConfig) -> Self {
        Self {
            text,
            target_language_code: &voice.language,
            speaker: &voice.speaker,
            pitch: voice.pitch,
            pace: voice.pace,
            loudness: voice.loudness,
            speech_sample_rate: voice.sample_rate.to_string(),
            enable_preprocessing: voice.enable_preprocessing,
            model: &voice.model,
            output_audio_codec: &voice.codec,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    audios: Vec<String>,
}

/// Decodes a provider response body into audio bytes.
fn decode_response(body: &[u8]) -> Result<Vec<u8>, StageError> {
    let response: SynthesisResponse = serde_json::from_slice(body)
        .map_err(|e| StageError::transient(format!("invalid synthesis response: {e}")))?;
    let first = response
        .audios
        .first()
        .ok_or_else(|| StageError::transient("synthesis API returned invalid response format"))?;
    debug!(request_id = ?response.request_id, "synthesis response received");
    STANDARD
        .decode(first)
        .map_err(|e| StageError::transient(format!("synthesis audio is not valid base64: {e}")))
}

pub struct HttpSynthesizer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.api_url.clone(), config.api_key.clone())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, StageError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(StageError::Auth {
                status: 401,
                message: "no API key configured (set LIPSYNTH_API_KEY)".to_string(),
            });
        };

        let body = serde_json::to_vec(&SynthesisRequest::new(text, voice))
            .map_err(|e| StageError::transient(format!("failed to encode request: {e}")))?;

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("api-subscription-key", api_key)
            .body(body)
            .send()
            .await
            .map_err(|e| StageError::transient(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageError::transient(format!("failed to read synthesis response: {e}")))?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes).to_string();
            return Err(StageError::from_status(status.as_u16(), detail));
        }

        decode_response(&bytes)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let voice = VoiceConfig::default();
        let json = serde_json::to_value(SynthesisRequest::new("namaste", &voice)).unwrap();
        assert_eq!(json["text"], "namaste");
        assert_eq!(json["target_language_code"], "hi-IN");
        assert_eq!(json["speaker"], "anushka");
        assert_eq!(json["speech_sample_rate"], "22050");
        assert_eq!(json["model"], "bulbul:v2");
        assert_eq!(json["output_audio_codec"], "wav");
        assert_eq!(json["enable_preprocessing"], true);
    }

    #[test]
    fn test_decode_first_audio() {
        let body = br#"{"request_id":"r1","audios":["UklGRg==","AAAA"]}"#;
        assert_eq!(decode_response(body).unwrap(), b"RIFF");
    }

    #[test]
    fn test_decode_empty_audios_is_transient() {
        let error = decode_response(br#"{"request_id":"r1","audios":[]}"#).unwrap_err();
        assert!(error.to_string().contains("invalid response format"));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_response(b"<html>").is_err());
        assert!(decode_response(br#"{"audios":["***"]}"#).is_err());
    }

    #[test]
    fn test_blank_key_is_treated_as_missing() {
        let synth = HttpSynthesizer::new("http://localhost", Some("   ".to_string()));
        assert!(!synth.has_api_key());
    }

    #[tokio::test]
    async fn test_missing_key_fails_with_auth_before_request() {
        let synth = HttpSynthesizer::new("http://127.0.0.1:9", None);
        let error = synth
            .synthesize("hi", &VoiceConfig::default())
            .await
            .unwrap_err();
        assert!(error.is_auth());
    }
}
