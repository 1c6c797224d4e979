//! Concurrency-limited fan-out of the synthesis stage for batch mode.

use crate::pipeline::error::StageError;
use crate::pipeline::retry::Sleeper;
use crate::pipeline::synthesis::SynthesisStage;
use crate::pipeline::types::Utterance;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-index synthesis results of one batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: BTreeSet<usize>,
    pub outcomes: BTreeMap<usize, Result<PathBuf, StageError>>,
}

impl BatchOutcome {
    pub fn failures(&self) -> impl Iterator<Item = (usize, &StageError)> {
        self.outcomes
            .iter()
            .filter_map(|(index, result)| result.as_ref().err().map(|e| (*index, e)))
    }
}

/// Runs synthesis in consecutive groups of `limit`, pausing between groups.
pub struct ConcurrencyLimitedBatcher {
    stage: Arc<SynthesisStage>,
    limit: usize,
    pacing: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl ConcurrencyLimitedBatcher {
    pub fn new(
        stage: Arc<SynthesisStage>,
        limit: usize,
        pacing: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            stage,
            limit: limit.max(1),
            pacing,
            sleeper,
        }
    }

    /// Synthesizes every utterance; a failure is recorded, never propagated.
    pub async fn run_bounded(&self, utterances: &[Utterance]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (group_index, group) in utterances.chunks(self.limit).enumerate() {
            if group_index > 0 && !self.pacing.is_zero() {
                self.sleeper.sleep(self.pacing).await;
            }
            debug!(
                group = group_index,
                first = group[0].index,
                size = group.len(),
                "synthesis group"
            );

            let results = join_all(group.iter().map(|utterance| async move {
                (utterance.index, self.stage.synthesize(utterance).await)
            }))
            .await;

            for (index, result) in results {
                if result.is_ok() {
                    outcome.succeeded.insert(index);
                }
                outcome.outcomes.insert(index, result);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retry::{RecordingSleeper, RetryPolicy, RetryingInvoker};
    use crate::store::ArtifactStore;
    use crate::tts::mock::MockSynthesizer;
    use crate::tts::provider::VoiceConfig;
    use tempfile::TempDir;

    fn batcher(
        synth: Arc<MockSynthesizer>,
        dir: &TempDir,
        limit: usize,
        sleeper: &RecordingSleeper,
    ) -> ConcurrencyLimitedBatcher {
        let invoker = RetryingInvoker::new(RetryPolicy::new(1, Duration::ZERO));
        let stage = SynthesisStage::new(
            synth,
            VoiceConfig::default(),
            ArtifactStore::new(dir.path()),
            invoker,
        );
        ConcurrencyLimitedBatcher::new(
            Arc::new(stage),
            limit,
            Duration::from_millis(100),
            Arc::new(sleeper.clone()),
        )
    }

    fn utterances(texts: &[&str]) -> Vec<Utterance> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Utterance::new(i, *t))
            .collect()
    }

    #[tokio::test]
    async fn test_groups_bounded_by_limit() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(MockSynthesizer::new().with_latency(Duration::from_millis(20)));
        let sleeper = RecordingSleeper::new();
        let batcher = batcher(synth.clone(), &tmp, 2, &sleeper);

        let outcome = batcher
            .run_bounded(&utterances(&["a", "b", "c", "d", "e"]))
            .await;

        assert_eq!(outcome.succeeded.len(), 5);
        assert_eq!(synth.max_concurrency(), 2);
        // Pacing between groups only: 3 groups, 2 pauses.
        assert_eq!(sleeper.waits(), vec![Duration::from_millis(100); 2]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_group_or_later_groups() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(
            MockSynthesizer::new().with_failure("b", StageError::transient("provider down")),
        );
        let sleeper = RecordingSleeper::new();
        let batcher = batcher(synth.clone(), &tmp, 2, &sleeper);

        let outcome = batcher.run_bounded(&utterances(&["a", "b", "c"])).await;

        assert_eq!(outcome.succeeded, BTreeSet::from([0, 2]));
        let failures: Vec<_> = outcome.failures().map(|(i, _)| i).collect();
        assert_eq!(failures, vec![1]);
        assert_eq!(outcome.outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let tmp = TempDir::new().unwrap();
        let sleeper = RecordingSleeper::new();
        let batcher = batcher(Arc::new(MockSynthesizer::new()), &tmp, 2, &sleeper);

        let outcome = batcher.run_bounded(&[]).await;

        assert!(outcome.succeeded.is_empty());
        assert!(outcome.outcomes.is_empty());
        assert!(sleeper.waits().is_empty());
    }
}
