//! Wall-clock comparison of streaming overlap against a sequential baseline.
//!
//! Both stages use fixed mock latencies, so the gap between the two groups
//! is the time saved by running extraction(i) alongside synthesis(i+1).

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lipsynth::Message;
use lipsynth::pipeline::{Pipeline, PipelineConfig, RecordingSleeper};
use lipsynth::store::ArtifactStore;
use lipsynth::tts::{MockSynthesizer, SpeechSynthesizer, VoiceConfig};
use lipsynth::visemes::{MockExtractor, VisemeExtractor};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

const STAGE_LATENCY: Duration = Duration::from_millis(5);

fn turn(n: usize) -> Vec<Message> {
    (0..n).map(|i| Message::new(format!("line {i}"))).collect()
}

fn mocks() -> (Arc<MockSynthesizer>, Arc<MockExtractor>) {
    (
        Arc::new(MockSynthesizer::new().with_latency(STAGE_LATENCY)),
        Arc::new(MockExtractor::new().with_latency(STAGE_LATENCY)),
    )
}

/// Synthesize then extract each message, one index at a time.
async fn sequential(messages: &[Message], store: &ArtifactStore) -> usize {
    let (synth, extractor) = mocks();
    let voice = VoiceConfig::default();
    let mut done = 0;
    for (index, message) in messages.iter().enumerate() {
        let Ok(audio) = synth.synthesize(&message.text, &voice).await else {
            continue;
        };
        let Ok(path) = store.write_audio(index, &audio).await else {
            continue;
        };
        if extractor.extract(&path, &store.track_path(index)).await.is_ok() {
            done += 1;
        }
    }
    done
}

async fn streamed(messages: Vec<Message>, store: ArtifactStore) -> usize {
    let (synth, extractor) = mocks();
    let pipeline = Pipeline::new(PipelineConfig::default(), synth, extractor, store)
        .with_sleeper(Arc::new(RecordingSleeper::new()));
    pipeline.stream(messages).collect::<Vec<_>>().await.len()
}

fn bench_overlap(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let tmp = tempfile::TempDir::new().unwrap();
    let store = ArtifactStore::new(tmp.path());

    let mut group = c.benchmark_group("pipeline_overlap");
    group.sample_size(20);

    for n in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::new("sequential", n), &n, |b, &n| {
            b.to_async(&rt).iter(|| {
                let store = store.clone();
                async move { black_box(sequential(&turn(n), &store).await) }
            });
        });
        group.bench_with_input(BenchmarkId::new("streaming", n), &n, |b, &n| {
            b.to_async(&rt).iter(|| {
                let store = store.clone();
                async move { black_box(streamed(turn(n), store).await) }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_overlap);
criterion_main!(benches);
