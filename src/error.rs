//! Error types for lipsynth.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LipsynthError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input errors
    #[error("Invalid utterance input: {message}")]
    InvalidInput { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Artifact store errors
    #[error("Artifact not found at {path}")]
    ArtifactNotFound { path: String },

    #[error("Viseme track at {path} is malformed: {message}")]
    TrackParse { path: String, message: String },

    // Result delivery errors
    #[error("Result sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LipsynthError>;
