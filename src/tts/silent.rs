//! Offline synthesizer that renders silence sized to the text.
//!
//! Lets the pipeline run end to end without provider credentials; the viseme
//! extractor still accepts the result since it is a valid PCM WAV.

use crate::pipeline::error::StageError;
use crate::tts::provider::{SpeechSynthesizer, VoiceConfig};
use async_trait::async_trait;
use std::io::Cursor;

/// Approximate speaking time per character, in milliseconds.
const MS_PER_CHAR: u64 = 60;

/// Shortest clip produced, in milliseconds.
const MIN_DURATION_MS: u64 = 300;

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

impl SilentSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Clip length for `text`.
    pub fn duration_ms(text: &str) -> u64 {
        (text.chars().count() as u64 * MS_PER_CHAR).max(MIN_DURATION_MS)
    }

    fn render(duration_ms: u64, sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = sample_rate as u64 * duration_ms / 1000;
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for _ in 0..samples {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, StageError> {
        let duration_ms = Self::duration_ms(text);
        Self::render(duration_ms, voice.sample_rate)
            .map_err(|e| StageError::transient(format!("failed to render silence: {e}")))
    }

    fn name(&self) -> &str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_has_floor() {
        assert_eq!(SilentSynthesizer::duration_ms(""), MIN_DURATION_MS);
        assert_eq!(SilentSynthesizer::duration_ms(&"a".repeat(10)), 600);
    }

    #[tokio::test]
    async fn test_renders_parseable_wav() {
        let voice = VoiceConfig {
            sample_rate: 16000,
            ..VoiceConfig::default()
        };
        let bytes = SilentSynthesizer::new()
            .synthesize("hello there", &voice)
            .await
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        // 11 chars * 60ms = 660ms at 16kHz
        assert_eq!(reader.len(), 16000 * 660 / 1000);
    }
}
