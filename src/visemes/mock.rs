use crate::pipeline::error::StageError;
use crate::pipeline::types::StageKind;
use crate::testing::{CallLog, index_from_artifact};
use crate::visemes::extractor::VisemeExtractor;
use crate::visemes::track::{MouthCue, MouthShape, TrackMetadata, VisemeTrack};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted extractor for tests and benchmarks.
///
/// Behavior is keyed by the index parsed from the `message_{i}` artifact name.
/// On success writes a two-cue track to the output path.
#[derive(Default)]
pub struct MockExtractor {
    latency: Duration,
    latencies: HashMap<usize, Duration>,
    failures: HashMap<usize, StageError>,
    no_output: HashSet<usize>,
    calls: Mutex<HashMap<usize, u32>>,
    log: Option<CallLog>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_index_latency(mut self, index: usize, latency: Duration) -> Self {
        self.latencies.insert(index, latency);
        self
    }

    pub fn with_failure(mut self, index: usize, error: StageError) -> Self {
        self.failures.insert(index, error);
        self
    }

    /// Report success for `index` without writing a track.
    pub fn without_output(mut self, index: usize) -> Self {
        self.no_output.insert(index);
        self
    }

    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls_for(&self, index: usize) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }

    /// Track written for a given audio path.
    pub fn track_for(audio: &Path) -> VisemeTrack {
        VisemeTrack {
            metadata: TrackMetadata {
                sound_file: audio.display().to_string(),
                duration: 0.5,
            },
            mouth_cues: vec![
                MouthCue {
                    start: 0.0,
                    end: 0.2,
                    value: MouthShape::X,
                },
                MouthCue {
                    start: 0.2,
                    end: 0.5,
                    value: MouthShape::B,
                },
            ],
        }
    }
}

#[async_trait]
impl VisemeExtractor for MockExtractor {
    async fn extract(&self, audio: &Path, output: &Path) -> Result<(), StageError> {
        let index = index_from_artifact(audio).ok_or_else(|| StageError::ExtractionFailed {
            message: format!("unexpected artifact name {}", audio.display()),
        })?;
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(index)
            .or_default() += 1;

        let slot = self
            .log
            .as_ref()
            .map(|log| (log, log.start(StageKind::Extraction, index)));

        let latency = self.latencies.get(&index).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = if let Some(error) = self.failures.get(&index) {
            Err(error.clone())
        } else if self.no_output.contains(&index) {
            Ok(())
        } else {
            let json = serde_json::to_vec(&Self::track_for(audio))
                .map_err(|e| StageError::ExtractionFailed {
                    message: e.to_string(),
                })?;
            tokio::fs::write(output, json)
                .await
                .map_err(|e| StageError::ExtractionFailed {
                    message: e.to_string(),
                })
        };

        if let Some((log, slot)) = slot {
            log.end(slot);
        }
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_track_for_index() {
        let tmp = TempDir::new().unwrap();
        let audio = tmp.path().join("message_3.wav");
        let output = tmp.path().join("message_3.json");
        let extractor = MockExtractor::new();

        extractor.extract(&audio, &output).await.unwrap();

        let track: VisemeTrack =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(track, MockExtractor::track_for(&audio));
        assert_eq!(extractor.calls_for(3), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_missing_output() {
        let tmp = TempDir::new().unwrap();
        let extractor = MockExtractor::new()
            .with_failure(0, StageError::ExtractionFailed {
                message: "boom".to_string(),
            })
            .without_output(1);

        assert!(
            extractor
                .extract(&tmp.path().join("message_0.wav"), &tmp.path().join("message_0.json"))
                .await
                .is_err()
        );
        extractor
            .extract(&tmp.path().join("message_1.wav"), &tmp.path().join("message_1.json"))
            .await
            .unwrap();
        assert!(!tmp.path().join("message_1.json").exists());
    }
}
