use crate::pipeline::error::StageError;
use crate::pipeline::types::StageKind;
use crate::testing::CallLog;
use crate::tts::provider::{SpeechSynthesizer, VoiceConfig};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted synthesizer for tests and benchmarks.
///
/// Behavior is keyed by utterance text. Returns `RIFF:<text>` as audio unless
/// scripted otherwise.
#[derive(Default)]
pub struct MockSynthesizer {
    latency: Duration,
    latencies: HashMap<String, Duration>,
    scripted: Mutex<HashMap<String, VecDeque<StageError>>>,
    permanent: HashMap<String, StageError>,
    silent: HashSet<String>,
    indices: HashMap<String, usize>,
    calls: Mutex<HashMap<String, u32>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    log: Option<CallLog>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latency applied to every call without a per-text latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_text_latency(mut self, text: &str, latency: Duration) -> Self {
        self.latencies.insert(text.to_string(), latency);
        self
    }

    /// Fail the next calls for `text` with `errors`, in order, then succeed.
    pub fn with_errors(self, text: &str, errors: Vec<StageError>) -> Self {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(text.to_string(), errors.into());
        self
    }

    /// Fail every call for `text`.
    pub fn with_failure(mut self, text: &str, error: StageError) -> Self {
        self.permanent.insert(text.to_string(), error);
        self
    }

    /// Report success for `text` but return no audio.
    pub fn with_empty_output(mut self, text: &str) -> Self {
        self.silent.insert(text.to_string());
        self
    }

    /// Record call spans into `log`, attributing `texts[i]` to index `i`.
    pub fn with_call_log(mut self, log: CallLog, texts: &[&str]) -> Self {
        self.indices = texts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();
        self.log = Some(log);
        self
    }

    /// Number of calls made for `text`.
    pub fn calls_for(&self, text: &str) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text)
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

    /// Highest number of calls observed in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_error(&self, text: &str) -> Option<StageError> {
        if let Some(error) = self.permanent.get(text) {
            return Some(error.clone());
        }
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(text)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>, StageError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(text.to_string())
            .or_default() += 1;

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let slot = match (&self.log, self.indices.get(text)) {
            (Some(log), Some(&index)) => Some((log, log.start(StageKind::Synthesis, index))),
            _ => None,
        };

        let latency = self.latencies.get(text).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        if let Some((log, slot)) = slot {
            log.end(slot);
        }

        if let Some(error) = self.next_error(text) {
            return Err(error);
        }
        if self.silent.contains(text) {
            return Ok(Vec::new());
        }
        Ok(format!("RIFF:{text}").into_bytes())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
