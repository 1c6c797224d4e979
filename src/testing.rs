//! Shared test utilities used by the mock stages, unit tests, integration
//! tests and benchmarks.

use crate::pipeline::types::StageKind;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Start/end timestamps of one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSpan {
    pub stage: StageKind,
    pub index: usize,
    pub start: Instant,
    pub end: Option<Instant>,
}

impl CallSpan {
    /// True if the two calls were running at the same instant.
    pub fn overlaps(&self, other: &CallSpan) -> bool {
        let (Some(self_end), Some(other_end)) = (self.end, other.end) else {
            return false;
        };
        self.start < other_end && other.start < self_end
    }
}

/// Timeline of external calls across both stages, shared by the mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    spans: Arc<Mutex<Vec<CallSpan>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call start and returns its slot for [`CallLog::end`].
    pub fn start(&self, stage: StageKind, index: usize) -> usize {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.push(CallSpan {
            stage,
            index,
            start: Instant::now(),
            end: None,
        });
        spans.len() - 1
    }

    pub fn end(&self, slot: usize) {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(span) = spans.get_mut(slot) {
            span.end = Some(Instant::now());
        }
    }

    pub fn spans(&self) -> Vec<CallSpan> {
        self.spans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Spans recorded for one `(stage, index)` key.
    pub fn calls(&self, stage: StageKind, index: usize) -> Vec<CallSpan> {
        self.spans()
            .into_iter()
            .filter(|s| s.stage == stage && s.index == index)
            .collect()
    }

    /// True if any call for `a` overlapped any call for `b`.
    pub fn overlapped(&self, a: (StageKind, usize), b: (StageKind, usize)) -> bool {
        let left = self.calls(a.0, a.1);
        let right = self.calls(b.0, b.1);
        left.iter().any(|l| right.iter().any(|r| l.overlaps(r)))
    }
}

/// Parses the utterance index out of an artifact path like `message_3.wav`.
pub fn index_from_artifact(path: &std::path::Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("message_")?
        .parse()
        .ok()
}
