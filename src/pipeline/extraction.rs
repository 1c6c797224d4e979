//! Extraction stage: audio artifact → viseme track, fused into the message.

use crate::error::LipsynthError;
use crate::pipeline::error::StageError;
use crate::pipeline::types::Message;
use crate::store::ArtifactStore;
use crate::visemes::extractor::VisemeExtractor;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Result of fusing one index: the message with whatever fields could be
/// attached, plus the first failure encountered.
#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub message: Message,
    pub failure: Option<StageError>,
}

impl Fused {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct ExtractionStage {
    extractor: Arc<dyn VisemeExtractor>,
    store: ArtifactStore,
}

impl ExtractionStage {
    pub fn new(extractor: Arc<dyn VisemeExtractor>, store: ArtifactStore) -> Self {
        Self { extractor, store }
    }

    /// Runs the extractor on slot `index` and attaches audio and track to `message`.
    ///
    /// The audio artifact for `index` must already exist. The audio is read
    /// back even when extraction fails, so synthesis output is never lost.
    /// The extractor is invoked once; it is a local process, not a
    /// rate-limited provider.
    pub async fn extract_and_fuse(&self, index: usize, mut message: Message) -> Fused {
        let audio_path = self.store.audio_path(index);
        let track_path = self.store.track_path(index);
        debug!(index, extractor = self.extractor.name(), "extracting visemes");

        let started = Instant::now();
        let mut failure = self.extractor.extract(&audio_path, &track_path).await.err();
        if failure.is_none() && !self.store.track_exists(index).await {
            failure = Some(StageError::ArtifactMissing {
                path: track_path.display().to_string(),
            });
        }

        match self.store.read_audio(index).await {
            Ok(audio) => message.audio = Some(audio),
            Err(e) => {
                failure.get_or_insert(artifact_error(e));
            }
        }

        if failure.is_none() {
            match self.store.read_track(index).await {
                Ok(track) => message.lipsync = Some(track),
                Err(e) => failure = Some(artifact_error(e)),
            }
        }

        if failure.is_none() {
            info!(
                index,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "lip sync complete"
            );
        }
        Fused { message, failure }
    }
}

fn artifact_error(e: LipsynthError) -> StageError {
    match e {
        LipsynthError::ArtifactNotFound { path } => StageError::ArtifactMissing { path },
        other => StageError::ExtractionFailed {
            message: other.to_string(),
        },
    }
}
