use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courseforge::generation::{
    GeneratedText, GenerationError, GenerationService, OutlineChunk, OutlineStream, TokenStream,
    UsageMetrics,
};
use courseforge::outline::OutlineStructure;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;

/// Usage every scripted call reports.
#[allow(dead_code)]
pub const MOCK_CALL_USAGE: UsageMetrics = UsageMetrics {
    prompt_tokens: 10,
    completion_tokens: 20,
    total_tokens: 30,
};

/// Token chunks every successful streamed leaf call yields, in order.
#[allow(dead_code)]
pub const MOCK_TOKEN_CHUNKS: [&str; 2] = ["# Lesson\n\n", "Generated body text."];

/// Scripted [`GenerationService`] for exercising the pipeline without a
/// provider. Leaf generation calls are numbered 1, 2, ... in invocation
/// order across both call modes, so tests can fail leaf `k` precisely.
#[derive(Debug, Default)]
pub struct MockGenerator {
    outline: Option<OutlineStructure>,
    partials: Vec<Value>,
    failing_leaves: HashSet<usize>,
    leaf_delay: Option<Duration>,
    fail_outline_stream: bool,
    fail_research: bool,
    leaf_calls: AtomicUsize,
    research_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the structured stream: these partials, then this final outline.
    pub fn with_outline(mut self, outline: OutlineStructure) -> Self {
        self.outline = Some(outline);
        self
    }

    pub fn with_partials(mut self, partials: Vec<Value>) -> Self {
        self.partials = partials;
        self
    }

    /// Make leaf generation call number `ordinal` (1-indexed) fail.
    pub fn failing_leaf(mut self, ordinal: usize) -> Self {
        self.failing_leaves.insert(ordinal);
        self
    }

    /// Sleep this long inside every leaf generation call.
    pub fn with_leaf_delay(mut self, delay: Duration) -> Self {
        self.leaf_delay = Some(delay);
        self
    }

    /// Make the structured stream fail hard after its partials.
    pub fn fail_outline_stream(mut self) -> Self {
        self.fail_outline_stream = true;
        self
    }

    pub fn fail_research(mut self) -> Self {
        self.fail_research = true;
        self
    }

    pub fn leaf_call_count(&self) -> usize {
        self.leaf_calls.load(Ordering::SeqCst)
    }

    pub fn research_call_count(&self) -> usize {
        self.research_calls.load(Ordering::SeqCst)
    }

    /// Text a successful leaf call produces, whichever call mode was used.
    pub fn expected_leaf_body() -> String {
        MOCK_TOKEN_CHUNKS.concat()
    }

    async fn next_leaf_call(&self) -> Result<(), GenerationError> {
        let ordinal = self.leaf_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.leaf_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_leaves.contains(&ordinal) {
            return Err(GenerationError::provider(format!(
                "injected failure for call {ordinal}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationService for MockGenerator {
    async fn generate_once(&self, _prompt: &str) -> Result<GeneratedText, GenerationError> {
        self.next_leaf_call().await?;
        Ok(GeneratedText {
            text: Self::expected_leaf_body(),
            usage: MOCK_CALL_USAGE,
        })
    }

    async fn stream_tokens(&self, _prompt: &str) -> Result<TokenStream, GenerationError> {
        self.next_leaf_call().await?;
        let chunks = MOCK_TOKEN_CHUNKS
            .iter()
            .map(|chunk| Ok(chunk.to_string()))
            .collect::<Vec<_>>();
        Ok(stream::iter(chunks).boxed())
    }

    async fn stream_structured_outline(
        &self,
        _prompt: &str,
    ) -> Result<OutlineStream, GenerationError> {
        let mut items: Vec<Result<OutlineChunk, GenerationError>> = self
            .partials
            .iter()
            .cloned()
            .map(|partial| Ok(OutlineChunk::Partial(partial)))
            .collect();
        if self.fail_outline_stream {
            items.push(Err(GenerationError::provider("injected stream failure")));
        } else if let Some(outline) = self.outline.clone() {
            items.push(Ok(OutlineChunk::Final {
                outline,
                usage: MOCK_CALL_USAGE,
            }));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn research(&self, _query: &str) -> Result<String, GenerationError> {
        self.research_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_research {
            Err(GenerationError::provider("injected research failure"))
        } else {
            Ok("Fresh research notes about the topic.".to_string())
        }
    }
}
