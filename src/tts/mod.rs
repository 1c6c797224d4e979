//! Speech-synthesis collaborators.

#[cfg(feature = "http")]
pub mod http;
pub mod mock;
pub mod provider;
pub mod silent;
pub mod voices;

#[cfg(feature = "http")]
pub use http::HttpSynthesizer;
pub use mock::MockSynthesizer;
pub use provider::{SpeechSynthesizer, VoiceConfig};
pub use silent::SilentSynthesizer;
pub use voices::{SPEAKERS, Speaker, find_speaker};
