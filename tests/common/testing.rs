use std::sync::Arc;

use courseforge::events::{PipelineEvent, ProgressChannel};
use courseforge::orchestrator::{Pipeline, PipelineReport};
use courseforge::request::GenerationRequest;
use courseforge::store::MemoryStore;

use super::mocks::MockGenerator;

#[allow(dead_code)]
pub type TestPipeline = Pipeline<MockGenerator, MemoryStore>;

/// Run one typed request and return the report plus every emitted event.
#[allow(dead_code)]
pub async fn run_request(
    pipeline: &TestPipeline,
    request: GenerationRequest,
) -> (PipelineReport, Vec<PipelineEvent>) {
    let (channel, stream) = ProgressChannel::unbounded();
    let consumer = tokio::spawn(stream.collect_all());
    let report = pipeline.run(request, &channel).await;
    drop(channel);
    (report, consumer.await.expect("event consumer panicked"))
}

/// Run one raw `{step, data}` payload through dispatch.
#[allow(dead_code)]
pub async fn dispatch_payload(
    pipeline: &TestPipeline,
    payload: serde_json::Value,
) -> (PipelineReport, Vec<PipelineEvent>) {
    let (channel, stream) = ProgressChannel::unbounded();
    let consumer = tokio::spawn(stream.collect_all());
    let report = pipeline.dispatch(payload, &channel).await;
    drop(channel);
    (report, consumer.await.expect("event consumer panicked"))
}

#[allow(dead_code)]
pub fn pipeline_with(generator: MockGenerator, store: Arc<MemoryStore>) -> TestPipeline {
    Pipeline::new(Arc::new(generator), store)
}

/// Every `progress`-bearing event must carry a value in [0, 100] that never
/// decreases across the run.
#[allow(dead_code)]
pub fn assert_progress_monotonic(events: &[PipelineEvent]) {
    let mut previous = f64::MIN;
    for event in events {
        if let Some(progress) = event.progress_value() {
            assert!(
                (0.0..=100.0).contains(&progress),
                "progress {progress} out of range in {event:?}"
            );
            assert!(
                progress >= previous,
                "progress regressed from {previous} to {progress} in {event:?}"
            );
            previous = progress;
        }
    }
}

/// Exactly one terminal event, and it is the last one emitted.
#[allow(dead_code)]
pub fn assert_single_terminal(events: &[PipelineEvent], expected_tag: &str) {
    let terminal: Vec<_> = events.iter().filter(|event| event.is_terminal()).collect();
    assert_eq!(
        terminal.len(),
        1,
        "expected exactly one terminal event, got {terminal:?}"
    );
    let last = events.last().expect("no events emitted");
    assert!(last.is_terminal(), "last event is not terminal: {last:?}");
    assert_eq!(last.tag(), expected_tag);
}

#[allow(dead_code)]
pub fn tags(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(PipelineEvent::tag).collect()
}
