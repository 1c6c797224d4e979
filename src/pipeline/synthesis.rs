//! Synthesis stage: utterance text → audio artifact in the store.

use crate::error::LipsynthError;
use crate::pipeline::error::StageError;
use crate::pipeline::retry::RetryingInvoker;
use crate::pipeline::types::Utterance;
use crate::store::ArtifactStore;
use crate::tts::provider::{SpeechSynthesizer, VoiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct SynthesisStage {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceConfig,
    store: ArtifactStore,
    invoker: RetryingInvoker,
}

impl SynthesisStage {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: VoiceConfig,
        store: ArtifactStore,
        invoker: RetryingInvoker,
    ) -> Self {
        Self {
            synthesizer,
            voice,
            store,
            invoker,
        }
    }

    /// Produces the audio artifact for `utterance` in its slot.
    ///
    /// Succeeds only once the artifact exists on disk. A provider that
    /// reports success without producing audio fails the attempt with
    /// [`StageError::ArtifactMissing`], which is retried.
    pub async fn synthesize(&self, utterance: &Utterance) -> Result<PathBuf, StageError> {
        let index = utterance.index;
        info!(
            index,
            provider = self.synthesizer.name(),
            text = %utterance.preview(),
            "synthesizing"
        );

        if let Err(e) = self.store.clear(index).await {
            warn!(index, error = %e, "could not clear stale artifacts");
        }

        let started = Instant::now();
        let path = self
            .invoker
            .invoke(index, || self.attempt(utterance))
            .await?;

        info!(
            index,
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "synthesis complete"
        );
        Ok(path)
    }

    async fn attempt(&self, utterance: &Utterance) -> Result<PathBuf, StageError> {
        let index = utterance.index;
        let audio = self
            .synthesizer
            .synthesize(&utterance.text, &self.voice)
            .await?;

        let path = self.store.audio_path(index);
        if audio.is_empty() {
            debug!(index, "provider returned no audio");
        } else {
            self.store
                .write_audio(index, &audio)
                .await
                .map_err(|e| write_error(&path, e))?;
        }

        if !self.store.audio_exists(index).await {
            return Err(StageError::ArtifactMissing {
                path: path.display().to_string(),
            });
        }
        Ok(path)
    }
}

fn write_error(path: &std::path::Path, e: LipsynthError) -> StageError {
    StageError::transient(format!("failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retry::{RecordingSleeper, RetryPolicy};
    use crate::tts::mock::MockSynthesizer;
    use std::time::Duration;
    use tempfile::TempDir;

    fn stage(
        synth: Arc<MockSynthesizer>,
        dir: &TempDir,
        sleeper: &RecordingSleeper,
    ) -> SynthesisStage {
        let invoker = RetryingInvoker::new(RetryPolicy::new(3, Duration::from_millis(10)))
            .with_sleeper(Arc::new(sleeper.clone()));
        SynthesisStage::new(
            synth,
            VoiceConfig::default(),
            ArtifactStore::new(dir.path()),
            invoker,
        )
    }

    #[tokio::test]
    async fn test_writes_artifact_to_slot() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(MockSynthesizer::new());
        let sleeper = RecordingSleeper::new();
        let stage = stage(synth.clone(), &tmp, &sleeper);

        let path = stage.synthesize(&Utterance::new(4, "hello")).await.unwrap();

        assert_eq!(path, tmp.path().join("message_4.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF:hello");
        assert_eq!(synth.calls_for("hello"), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_empty_audio_is_artifact_missing_and_retried() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(MockSynthesizer::new().with_empty_output("ghost"));
        let sleeper = RecordingSleeper::new();
        let stage = stage(synth.clone(), &tmp, &sleeper);

        let error = stage
            .synthesize(&Utterance::new(0, "ghost"))
            .await
            .unwrap_err();

        assert!(matches!(error, StageError::ArtifactMissing { .. }));
        assert_eq!(synth.calls_for("ghost"), 3);
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_artifact_does_not_mask_missing_output() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("message_0.wav"), b"old").unwrap();
        std::fs::write(tmp.path().join("message_0.json"), b"{}").unwrap();
        let synth = Arc::new(MockSynthesizer::new().with_empty_output("ghost"));
        let sleeper = RecordingSleeper::new();
        let stage = stage(synth, &tmp, &sleeper);

        assert!(stage.synthesize(&Utterance::new(0, "ghost")).await.is_err());
        assert!(!tmp.path().join("message_0.json").exists());
    }

    #[tokio::test]
    async fn test_auth_failure_single_attempt() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(
            MockSynthesizer::new().with_failure("hi", StageError::from_status(401, "bad key")),
        );
        let sleeper = RecordingSleeper::new();
        let stage = stage(synth.clone(), &tmp, &sleeper);

        let error = stage.synthesize(&Utterance::new(0, "hi")).await.unwrap_err();

        assert!(error.is_auth());
        assert_eq!(synth.calls_for("hi"), 1);
        assert!(sleeper.waits().is_empty());
    }
}
