//! lipsynth - Speech synthesis and lip-sync tracks for talking avatars
//!
//! Turns a turn of chat messages into audio clips and viseme tracks,
//! either all at once or streamed back in order as each message is ready.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod testing;
pub mod tts;
pub mod visemes;

// Collaborators (synthesize → extract → deliver)
pub use pipeline::sink::{ChannelSink, CollectorSink, EventSink, JsonLinesSink};
pub use tts::provider::SpeechSynthesizer;
pub use visemes::extractor::VisemeExtractor;

// Pipeline
pub use pipeline::orchestrator::{BatchReport, Pipeline, PipelineConfig};
pub use pipeline::types::{Message, OrderedEvent, StreamFrame, Turn};

// Error handling
pub use error::{LipsynthError, Result};
pub use pipeline::error::{ErrorReporter, StageError};

// Config and storage
pub use config::Config;
pub use store::ArtifactStore;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
