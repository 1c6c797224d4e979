//! Pipeline orchestrator: drives synthesis and extraction across a turn.
//!
//! Batch mode synthesizes in bounded groups, then extracts every success in
//! parallel. Streaming mode emits one event per index in strict order while
//! keeping one synthesis and one extraction running ahead of delivery.

use crate::config::PipelineSection;
use crate::defaults;
use crate::error::{LipsynthError, Result};
use crate::pipeline::batcher::ConcurrencyLimitedBatcher;
use crate::pipeline::error::{ErrorReporter, LogReporter, StageError};
use crate::pipeline::extraction::{ExtractionStage, Fused};
use crate::pipeline::retry::{RetryPolicy, RetryingInvoker, Sleeper, TokioSleeper};
use crate::pipeline::sink::{ChannelSink, EventSink};
use crate::pipeline::synthesis::SynthesisStage;
use crate::pipeline::types::{Message, OrderedEvent, StageKind, StreamFrame, Utterance};
use crate::store::ArtifactStore;
use crate::tts::provider::{SpeechSynthesizer, VoiceConfig};
use crate::visemes::extractor::VisemeExtractor;
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Runtime limits for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Attempts per external synthesis call (at least 1).
    pub max_attempts: u32,
    /// Linear backoff base: failed attempt `a` waits `retry_delay * a`.
    pub retry_delay: Duration,
    /// Synthesis group size K in batch mode.
    pub synthesis_concurrency: usize,
    /// Pause between batch-mode synthesis groups.
    pub batch_pacing: Duration,
    /// Capacity of the frame channel used by [`Pipeline::spawn_stream`].
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
            synthesis_concurrency: defaults::SYNTHESIS_CONCURRENCY,
            batch_pacing: Duration::from_millis(defaults::BATCH_PACING_MS),
            channel_capacity: 16,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(section: &PipelineSection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            retry_delay: Duration::from_millis(section.retry_delay_ms),
            synthesis_concurrency: section.synthesis_concurrency.max(1),
            batch_pacing: Duration::from_millis(section.batch_pacing_ms),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }
}

/// Outcome of a batch run: the turn plus a result per index.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub messages: Vec<Message>,
    pub outcomes: BTreeMap<usize, std::result::Result<(), StageError>>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = (usize, &StageError)> {
        self.outcomes
            .iter()
            .filter_map(|(index, result)| result.as_ref().err().map(|e| (*index, e)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Synthesis → extraction pipeline over one conversational turn.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceConfig,
    extractor: Arc<dyn VisemeExtractor>,
    store: ArtifactStore,
    error_reporter: Arc<dyn ErrorReporter>,
    sleeper: Arc<dyn Sleeper>,
}

impl Pipeline {
    /// Creates a new pipeline with default voice, reporter and sleeper.
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        extractor: Arc<dyn VisemeExtractor>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            config,
            synthesizer,
            voice: VoiceConfig::default(),
            extractor,
            store,
            error_reporter: Arc::new(LogReporter),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Sets a custom sleeper for backoff and pacing (for deterministic testing).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn synthesis_stage(&self) -> Arc<SynthesisStage> {
        let invoker =
            RetryingInvoker::new(self.config.retry_policy()).with_sleeper(self.sleeper.clone());
        Arc::new(SynthesisStage::new(
            self.synthesizer.clone(),
            self.voice.clone(),
            self.store.clone(),
            invoker,
        ))
    }

    fn extraction_stage(&self) -> Arc<ExtractionStage> {
        Arc::new(ExtractionStage::new(
            self.extractor.clone(),
            self.store.clone(),
        ))
    }

    /// Batch mode: enrich every message, returning the whole turn.
    ///
    /// Never fails. Indices whose synthesis failed come back with only
    /// text, expression and animation.
    pub async fn run_all(&self, messages: Vec<Message>) -> Vec<Message> {
        self.run_batch(messages).await.messages
    }

    /// Batch mode with a per-index result alongside the messages.
    pub async fn run_batch(&self, mut messages: Vec<Message>) -> BatchReport {
        let utterances = Utterance::from_turn(&messages);
        info!(count = utterances.len(), "processing messages in batches");

        let batcher = ConcurrencyLimitedBatcher::new(
            self.synthesis_stage(),
            self.config.synthesis_concurrency,
            self.config.batch_pacing,
            self.sleeper.clone(),
        );
        let synthesized = batcher.run_bounded(&utterances).await;

        let mut outcomes = BTreeMap::new();
        for (index, error) in synthesized.failures() {
            self.error_reporter.report(StageKind::Synthesis, index, error);
            outcomes.insert(index, Err(error.clone()));
        }

        if synthesized.succeeded.is_empty() {
            if !messages.is_empty() {
                warn!("no audio files were created, skipping lip sync");
            }
            return BatchReport { messages, outcomes };
        }

        let created: Vec<String> = synthesized
            .succeeded
            .iter()
            .map(|&i| self.store.audio_path(i).display().to_string())
            .collect();
        info!(
            count = created.len(),
            files = %created.join(", "),
            "audio files created"
        );

        let extraction = self.extraction_stage();
        let fused = join_all(synthesized.succeeded.iter().map(|&index| {
            let extraction = extraction.clone();
            let message = messages[index].clone();
            async move { (index, extraction.extract_and_fuse(index, message).await) }
        }))
        .await;

        for (index, Fused { message, failure }) in fused {
            messages[index] = message;
            let result = match failure {
                Some(error) => {
                    self.error_reporter
                        .report(StageKind::Extraction, index, &error);
                    Err(error)
                }
                None => Ok(()),
            };
            outcomes.insert(index, result);
        }

        BatchReport { messages, outcomes }
    }

    /// Streaming mode: a lazy, ordered sequence of per-index events.
    ///
    /// Nothing runs until the stream is polled. Each call starts from fresh
    /// state. Dropping the stream stops scheduling new work; stage calls
    /// already started run to completion.
    pub fn stream(&self, messages: Vec<Message>) -> impl Stream<Item = OrderedEvent> + Send + 'static {
        let mut state = PipelineState::new(
            self.synthesis_stage(),
            self.extraction_stage(),
            messages,
            self.error_reporter.clone(),
        );
        async_stream::stream! {
            while let Some(event) = state.next_event().await {
                yield event;
            }
        }
    }

    /// Pulls the stream into `sink`, then hands it the aggregate turn.
    ///
    /// Returns the aggregate. For an empty turn the sink is not called.
    pub async fn drive(
        &self,
        messages: Vec<Message>,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Message>> {
        let mut aggregate = Vec::with_capacity(messages.len());
        let stream = self.stream(messages);
        tokio::pin!(stream);

        while let Some(event) = stream.next().await {
            aggregate.push(event.message.clone());
            let done = event.done;
            sink.handle(&event).await?;
            if done {
                sink.finish(&aggregate).await?;
                break;
            }
        }

        debug!(sink = sink.name(), count = aggregate.len(), "stream drained");
        Ok(aggregate)
    }

    /// Runs the stream on a background task, pushing frames into a channel.
    ///
    /// Yields every event followed by the aggregate `complete` frame.
    pub fn spawn_stream(&self, messages: Vec<Message>) -> mpsc::Receiver<StreamFrame> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            if let Err(e) = pipeline.drive(messages, &mut sink).await {
                match e {
                    LipsynthError::Sink { .. } => debug!(error = %e, "stream consumer went away"),
                    other => error!(error = %other, "stream failed"),
                }
            }
        });
        rx
    }
}

/// Position of the streaming state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing started yet.
    Init,
    /// Index 0 synthesis; no overlap exists yet.
    Bootstrap,
    /// Await extraction for the index, then emit it.
    Advance(usize),
    /// Settle synthesis for the index and launch its extraction.
    Lookahead(usize),
    Terminal,
}

/// Mutable state of one streaming run.
///
/// Owned by the single control flow that drives the stream; stage tasks
/// never touch it. At most one task exists per `(stage, index)`, and a
/// settled key is never relaunched.
pub struct PipelineState {
    synthesis: Arc<SynthesisStage>,
    extraction: Arc<ExtractionStage>,
    reporter: Arc<dyn ErrorReporter>,
    utterances: Vec<Utterance>,
    messages: Vec<Message>,
    phase: Phase,
    in_flight_synthesis: HashMap<usize, JoinHandle<std::result::Result<(), StageError>>>,
    in_flight_extraction: HashMap<usize, JoinHandle<Fused>>,
    synthesized: HashMap<usize, std::result::Result<(), StageError>>,
    extracted: HashMap<usize, Option<StageError>>,
}

impl PipelineState {
    pub fn new(
        synthesis: Arc<SynthesisStage>,
        extraction: Arc<ExtractionStage>,
        messages: Vec<Message>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            synthesis,
            extraction,
            reporter,
            utterances: Utterance::from_turn(&messages),
            messages,
            phase: Phase::Init,
            in_flight_synthesis: HashMap::new(),
            in_flight_extraction: HashMap::new(),
            synthesized: HashMap::new(),
            extracted: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of stage tasks currently outstanding.
    pub fn in_flight(&self) -> (usize, usize) {
        (self.in_flight_synthesis.len(), self.in_flight_extraction.len())
    }

    /// Launches synthesis for `index` unless it is in flight or settled.
    fn ensure_synthesis(&mut self, index: usize) {
        if self.synthesized.contains_key(&index) || self.in_flight_synthesis.contains_key(&index)
        {
            return;
        }
        let stage = self.synthesis.clone();
        let utterance = self.utterances[index].clone();
        debug!(index, "launching synthesis");
        let handle = tokio::spawn(async move { stage.synthesize(&utterance).await.map(|_| ()) });
        self.in_flight_synthesis.insert(index, handle);
    }

    /// Settles synthesis for `index`, launching it if needed.
    async fn await_synthesis(&mut self, index: usize) -> std::result::Result<(), StageError> {
        if let Some(settled) = self.synthesized.get(&index) {
            return settled.clone();
        }
        self.ensure_synthesis(index);
        let result = match self.in_flight_synthesis.remove(&index) {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!(index, error = %e, "synthesis task did not complete");
                Err(StageError::TaskAborted {
                    stage: StageKind::Synthesis,
                    index,
                })
            }),
            None => Err(StageError::TaskAborted {
                stage: StageKind::Synthesis,
                index,
            }),
        };
        if let Err(error) = &result {
            self.reporter.report(StageKind::Synthesis, index, error);
        }
        self.synthesized.insert(index, result.clone());
        result
    }

    /// Launches extraction for `index` unless it is in flight or settled.
    ///
    /// Callers must have settled synthesis for `index` successfully.
    fn ensure_extraction(&mut self, index: usize) {
        debug_assert!(
            matches!(self.synthesized.get(&index), Some(Ok(()))),
            "extraction launched for index {index} before its audio exists"
        );
        if self.extracted.contains_key(&index) || self.in_flight_extraction.contains_key(&index) {
            return;
        }
        let stage = self.extraction.clone();
        let message = self.messages[index].clone();
        debug!(index, "launching extraction");
        let handle = tokio::spawn(async move { stage.extract_and_fuse(index, message).await });
        self.in_flight_extraction.insert(index, handle);
    }

    /// Settles extraction for `index` and stores the fused message.
    async fn await_extraction(&mut self, index: usize) -> Option<StageError> {
        if let Some(settled) = self.extracted.get(&index) {
            return settled.clone();
        }
        if !self.in_flight_extraction.contains_key(&index) {
            debug!(index, "extraction not in flight, starting on demand");
            self.ensure_extraction(index);
        }
        let failure = match self.in_flight_extraction.remove(&index) {
            Some(handle) => match handle.await {
                Ok(Fused { message, failure }) => {
                    self.messages[index] = message;
                    failure
                }
                Err(e) => {
                    warn!(index, error = %e, "extraction task did not complete");
                    Some(StageError::TaskAborted {
                        stage: StageKind::Extraction,
                        index,
                    })
                }
            },
            None => Some(StageError::TaskAborted {
                stage: StageKind::Extraction,
                index,
            }),
        };
        if let Some(error) = &failure {
            self.reporter.report(StageKind::Extraction, index, error);
        }
        self.extracted.insert(index, failure.clone());
        failure
    }

    /// Builds the event for `index`, attaching `error` to message and event.
    fn emit(&mut self, index: usize, error: Option<String>, done: bool) -> OrderedEvent {
        if error.is_some() {
            self.messages[index].error = error.clone();
        }
        OrderedEvent {
            index,
            message: self.messages[index].clone(),
            done,
            error,
        }
    }

    /// Drives the state machine to the next event, or `None` when finished.
    pub async fn next_event(&mut self) -> Option<OrderedEvent> {
        loop {
            match self.phase {
                Phase::Init => {
                    if self.is_empty() {
                        self.phase = Phase::Terminal;
                        return None;
                    }
                    info!(count = self.len(), "streaming messages");
                    self.phase = Phase::Bootstrap;
                }
                Phase::Bootstrap => {
                    if let Some(event) = self.bootstrap().await {
                        return Some(event);
                    }
                }
                Phase::Advance(index) => return Some(self.advance(index).await),
                Phase::Lookahead(index) => self.lookahead(index).await,
                Phase::Terminal => return None,
            }
        }
    }

    /// Synthesizes index 0. Returns an event when the run ends here.
    async fn bootstrap(&mut self) -> Option<OrderedEvent> {
        if let Err(source) = self.await_synthesis(0).await {
            let error = StageError::Bootstrap {
                source: Box::new(source),
            };
            error!(error = %error, "stream aborted");
            self.phase = Phase::Terminal;
            return Some(self.emit(0, Some(error.to_string()), true));
        }

        if self.len() == 1 {
            let failure = self.await_extraction(0).await;
            self.messages[0].error = failure.map(|e| e.to_string());
            self.phase = Phase::Terminal;
            return Some(OrderedEvent {
                index: 0,
                message: self.messages[0].clone(),
                done: true,
                error: None,
            });
        }

        self.ensure_synthesis(1);
        self.ensure_extraction(0);
        self.phase = Phase::Advance(0);
        None
    }

    /// Emits `index` once its extraction settles, isolating any failure.
    async fn advance(&mut self, index: usize) -> OrderedEvent {
        let failure = match self.await_synthesis(index).await {
            Err(error) => Some(error),
            Ok(()) => self.await_extraction(index).await,
        };

        let done = index + 1 == self.len();
        self.phase = if done {
            Phase::Terminal
        } else {
            Phase::Lookahead(index + 1)
        };
        debug!(index, done, failed = failure.is_some(), "emitting");
        self.emit(index, failure.map(|e| e.to_string()), done)
    }

    /// Settles synthesis for `index` and starts its extraction on success.
    async fn lookahead(&mut self, index: usize) {
        if self.await_synthesis(index).await.is_ok() {
            self.ensure_extraction(index);
        }
        self.phase = Phase::Advance(index);
    }
}
