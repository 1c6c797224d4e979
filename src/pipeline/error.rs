//! Failure taxonomy and reporting for pipeline stages.

use crate::pipeline::types::StageKind;
use thiserror::Error;
use tracing::warn;

/// Retry classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential or permission problem; never retried.
    Auth,
    /// Provider throttling; retried with linear backoff.
    RateLimit,
    /// Anything else; retried up to the attempt bound.
    Other,
}

/// Errors raised by one external stage call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("rate limited (status {status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("{message}")]
    Transient { message: String },

    /// Provider reported success but no artifact materialized.
    #[error("artifact missing: {path} was not created")]
    ArtifactMissing { path: String },

    #[error(
        "viseme extractor not found: {path}\n\
         Download Rhubarb Lip-Sync from https://github.com/DanielSWolf/rhubarb-lip-sync/releases \
         and extract it into the configured bin directory"
    )]
    ExtractorNotFound { path: String },

    #[error("viseme extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("{stage} task for message {index} aborted")]
    TaskAborted { stage: StageKind, index: usize },

    /// Index 0 failed before any overlap existed; ends the stream.
    #[error("pipeline bootstrap failed: {source}")]
    Bootstrap { source: Box<StageError> },
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        StageError::Transient {
            message: message.into(),
        }
    }

    /// Classifies an HTTP status from a provider response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => StageError::Auth { status, message },
            429 => StageError::RateLimited { status, message },
            _ => StageError::Transient {
                message: format!("status {status}: {message}"),
            },
        }
    }

    /// Retry classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Auth { .. } => FailureKind::Auth,
            StageError::RateLimited { .. } => FailureKind::RateLimit,
            StageError::Bootstrap { source } => source.kind(),
            _ => FailureKind::Other,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == FailureKind::Auth
    }
}

/// Trait for reporting per-index stage failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, stage: StageKind, index: usize, error: &StageError);
}

/// Reporter that forwards failures to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: StageKind, index: usize, error: &StageError) {
        warn!(%stage, index, error = %error, "stage failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(StageError::from_status(401, "bad key").kind(), FailureKind::Auth);
        assert_eq!(StageError::from_status(403, "forbidden").kind(), FailureKind::Auth);
        assert_eq!(
            StageError::from_status(429, "slow down").kind(),
            FailureKind::RateLimit
        );
        assert_eq!(StageError::from_status(500, "oops").kind(), FailureKind::Other);
        assert_eq!(StageError::from_status(400, "bad").kind(), FailureKind::Other);
    }

    #[test]
    fn test_transient_status_keeps_code_in_message() {
        let error = StageError::from_status(503, "unavailable");
        assert_eq!(error.to_string(), "status 503: unavailable");
    }

    #[test]
    fn test_artifact_missing_is_retryable() {
        let error = StageError::ArtifactMissing {
            path: "audios/message_0.wav".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::Other);
        assert_eq!(
            error.to_string(),
            "artifact missing: audios/message_0.wav was not created"
        );
    }

    #[test]
    fn test_bootstrap_inherits_kind() {
        let error = StageError::Bootstrap {
            source: Box::new(StageError::from_status(401, "nope")),
        };
        assert!(error.is_auth());
        assert!(error.to_string().starts_with("pipeline bootstrap failed"));
    }

    #[test]
    fn test_task_aborted_display() {
        let error = StageError::TaskAborted {
            stage: StageKind::Extraction,
            index: 3,
        };
        assert_eq!(error.to_string(), "extraction task for message 3 aborted");
    }

    #[test]
    fn test_extractor_not_found_mentions_download() {
        let error = StageError::ExtractorNotFound {
            path: "bin/rhubarb".to_string(),
        };
        assert!(error.to_string().contains("rhubarb-lip-sync/releases"));
    }

    #[test]
    fn test_log_reporter() {
        let reporter = LogReporter;
        // Just ensure it doesn't panic without a subscriber
        reporter.report(StageKind::Synthesis, 0, &StageError::transient("x"));
    }
}
