//! The generation-service capability consumed by the pipeline.
//!
//! The pipeline never talks to a concrete text-generation provider; it is
//! handed a [`GenerationService`] with three call modes (single-shot, token
//! stream, structured-outline stream) plus a best-effort research sub-call.
//! Injecting the trait keeps every phase testable against scripted mocks,
//! including the per-leaf failure scenarios phase 3 is designed around.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use miette::Diagnostic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::outline::OutlineStructure;

/// Token accounting reported by the generation provider.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageMetrics {
    pub fn add(&mut self, other: &UsageMetrics) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Shared accumulator for usage reported across a pipeline invocation.
///
/// Phases record into it as calls complete; the orchestrator snapshots it
/// only after the phase future has fully resolved, so the final reading never
/// races an in-flight update.
#[derive(Debug, Default)]
pub struct UsageAccumulator {
    inner: Mutex<UsageMetrics>,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: &UsageMetrics) {
        self.inner.lock().add(usage);
    }

    pub fn snapshot(&self) -> UsageMetrics {
        *self.inner.lock()
    }
}

/// A completed single-shot generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub usage: UsageMetrics,
}

/// One item of a structured-outline stream: zero or more partials followed by
/// exactly one final object.
#[derive(Clone, Debug, PartialEq)]
pub enum OutlineChunk {
    /// A loose, possibly incomplete outline observed mid-stream.
    Partial(Value),
    /// The final, fully-formed outline and the usage the call consumed.
    Final {
        outline: OutlineStructure,
        usage: UsageMetrics,
    },
}

pub type TokenStream = BoxStream<'static, Result<String, GenerationError>>;
pub type OutlineStream = BoxStream<'static, Result<OutlineChunk, GenerationError>>;

/// Errors surfaced by a generation provider.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    /// The provider rejected or failed the call outright.
    #[error("generation provider error: {0}")]
    #[diagnostic(code(courseforge::generation::provider))]
    Provider(String),

    /// The structured stream closed without delivering a final object.
    #[error("generation stream ended without a final outline")]
    #[diagnostic(
        code(courseforge::generation::missing_final),
        help("the provider must terminate a structured stream with one final object")
    )]
    MissingFinal,

    /// This provider has no research capability.
    #[error("research augmentation is not supported by this provider")]
    #[diagnostic(code(courseforge::generation::research_unsupported))]
    ResearchUnsupported,

    #[error(transparent)]
    #[diagnostic(code(courseforge::generation::serde))]
    Serde(#[from] serde_json::Error),
}

impl GenerationError {
    pub fn provider(message: impl Into<String>) -> Self {
        GenerationError::Provider(message.into())
    }
}

/// Capability exposing the call modes the pipeline needs.
///
/// `research` has a default unsupported implementation; phase 1 treats any
/// research failure as best-effort and proceeds without the augmentation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Single-shot call returning the full text.
    async fn generate_once(&self, prompt: &str) -> Result<GeneratedText, GenerationError>;

    /// Streamed call yielding text chunks to be concatenated by the caller.
    async fn stream_tokens(&self, prompt: &str) -> Result<TokenStream, GenerationError>;

    /// Structured call yielding partial outlines and one final object.
    async fn stream_structured_outline(
        &self,
        prompt: &str,
    ) -> Result<OutlineStream, GenerationError>;

    /// Best-effort research sub-call returning free text to prepend to a
    /// later prompt.
    async fn research(&self, _query: &str) -> Result<String, GenerationError> {
        Err(GenerationError::ResearchUnsupported)
    }
}
