use crate::config::SynthesisConfig;
use crate::defaults;
use crate::pipeline::error::StageError;
use async_trait::async_trait;
use std::sync::Arc;

/// Voice parameters sent with every synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub speaker: String,
    pub language: String,
    pub model: String,
    pub pitch: f32,
    pub pace: f32,
    pub loudness: f32,
    pub sample_rate: u32,
    pub enable_preprocessing: bool,
    pub codec: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            speaker: defaults::SPEAKER.to_string(),
            language: defaults::LANGUAGE.to_string(),
            model: defaults::SYNTHESIS_MODEL.to_string(),
            pitch: 0.0,
            pace: 1.0,
            loudness: 1.0,
            sample_rate: defaults::SAMPLE_RATE,
            enable_preprocessing: true,
            codec: defaults::AUDIO_CODEC.to_string(),
        }
    }
}

impl From<&SynthesisConfig> for VoiceConfig {
    fn from(config: &SynthesisConfig) -> Self {
        Self {
            speaker: config.speaker.to_lowercase(),
            language: config.language.clone(),
            model: config.model.clone(),
            pitch: config.pitch,
            pace: config.pace,
            loudness: config.loudness,
            sample_rate: config.sample_rate,
            enable_preprocessing: config.enable_preprocessing,
            codec: config.codec.clone(),
        }
    }
}

/// Trait for text-to-speech providers.
///
/// Implementations classify their failures: credential problems as
/// [`StageError::Auth`], throttling as [`StageError::RateLimited`].
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, StageError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Implement SpeechSynthesizer for Arc<T> to allow sharing across stages.
#[async_trait]
impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, StageError> {
        (**self).synthesize(text, voice).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
