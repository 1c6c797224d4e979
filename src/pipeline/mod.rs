//! Two-stage pipeline: speech synthesis, then viseme extraction.
//!
//! Stage calls run as tokio tasks. The orchestrator owns all scheduling
//! state and is the only writer of each message.

pub mod batcher;
pub mod error;
pub mod extraction;
pub mod orchestrator;
pub mod retry;
pub mod sink;
pub mod synthesis;
pub mod types;

pub use batcher::{BatchOutcome, ConcurrencyLimitedBatcher};
pub use error::{ErrorReporter, FailureKind, LogReporter, StageError};
pub use extraction::{ExtractionStage, Fused};
pub use orchestrator::{BatchReport, Phase, Pipeline, PipelineConfig, PipelineState};
pub use retry::{RecordingSleeper, RetryPolicy, RetryingInvoker, Sleeper, TokioSleeper};
pub use sink::{ChannelSink, CollectorSink, EventSink, JsonLinesSink};
pub use synthesis::SynthesisStage;
pub use types::{
    Animation, FacialExpression, Message, OrderedEvent, StageKind, StreamFrame, Turn, Utterance,
};
