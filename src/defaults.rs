//! Default configuration constants for lipsynth.
//!
//! Shared by `config` (file defaults) and `pipeline` (runtime defaults) so the
//! two never drift apart.

/// Maximum number of attempts for one external stage call.
pub const MAX_ATTEMPTS: u32 = 10;

/// Base delay for linear retry backoff in milliseconds.
///
/// Attempt `a` that fails waits `RETRY_DELAY_MS * a` before the next attempt.
pub const RETRY_DELAY_MS: u64 = 2000;

/// Number of synthesis calls run concurrently in batch mode.
pub const SYNTHESIS_CONCURRENCY: usize = 2;

/// Pause between batch-mode synthesis groups, in milliseconds.
pub const BATCH_PACING_MS: u64 = 100;

/// Speech-synthesis endpoint.
pub const SYNTHESIS_API_URL: &str = "https://api.sarvam.ai/text-to-speech";

/// Default speaker id.
pub const SPEAKER: &str = "anushka";

/// Default target language code.
pub const LANGUAGE: &str = "hi-IN";

/// Default synthesis model.
pub const SYNTHESIS_MODEL: &str = "bulbul:v2";

/// Default output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 22050;

/// Default audio codec requested from the provider.
pub const AUDIO_CODEC: &str = "wav";

/// Directory searched for the viseme extractor binary.
pub const EXTRACTOR_BIN_DIR: &str = "bin";

/// Recognizer mode passed to the extractor (`-r`).
///
/// `pocketSphinx` is faster than the phonetic recognizer for short utterances.
pub const RECOGNIZER: &str = "pocketSphinx";

/// Directory holding per-utterance audio and track artifacts.
pub const AUDIO_DIR: &str = "audios";

/// Number of characters of utterance text included in log lines.
pub const LOG_PREVIEW_CHARS: usize = 50;
