//! The pipeline boundary: request dispatch, deadline enforcement, and error
//! folding.
//!
//! A caller hands the orchestrator a raw `{step, data}` payload and a
//! [`ProgressChannel`]; everything that can go wrong past that point is
//! observed as exactly one terminal `error` event inside the stream. The
//! orchestrator never raises past its own boundary.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::config::PipelineConfig;
use crate::control::CancelToken;
use crate::events::{PipelineEvent, ProgressChannel};
use crate::generation::{GenerationService, UsageAccumulator, UsageMetrics};
use crate::phases::{ContentExpander, OutlineApprover, OutlineGenerator, PhaseContext, PhaseError};
use crate::request::{GenerationRequest, RequestError};
use crate::store::DocumentStore;

/// Everything a pipeline invocation can fail with. Internal to the boundary:
/// callers only ever observe the folded `error` event.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Phase(#[from] PhaseError),

    #[error("pipeline deadline of {0:?} exceeded")]
    #[diagnostic(code(courseforge::pipeline::deadline))]
    DeadlineExceeded(Duration),
}

/// Outcome handed back to in-process callers; streaming clients get the same
/// information through the event stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Usage accumulated across every generation call of the invocation,
    /// read only after the phase future fully resolved.
    pub usage: UsageMetrics,
    /// Error message of the terminal `error` event, when one was emitted.
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Dispatches requests to the three phases over injected capabilities.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use courseforge::events::ProgressChannel;
/// use courseforge::orchestrator::Pipeline;
/// use courseforge::store::MemoryStore;
/// use serde_json::json;
///
/// # async fn run(generator: Arc<dyn courseforge::generation::GenerationService>) {
/// let store = Arc::new(MemoryStore::new());
/// let pipeline = Pipeline::new(generator, store);
///
/// let (channel, stream) = ProgressChannel::unbounded();
/// let payload = json!({
///     "step": "generate_structure",
///     "data": {"title": "Intro to X", "description": "..."},
/// });
///
/// let consumer = tokio::spawn(stream.collect_all());
/// pipeline.dispatch(payload, &channel).await;
/// drop(channel);
/// let events = consumer.await.unwrap();
/// # }
/// ```
pub struct Pipeline<G: ?Sized, S: ?Sized> {
    generator: Arc<G>,
    store: Arc<S>,
    config: PipelineConfig,
}

impl<G, S> Pipeline<G, S>
where
    G: GenerationService + ?Sized,
    S: DocumentStore + ?Sized,
{
    pub fn new(generator: Arc<G>, store: Arc<S>) -> Self {
        Self::with_config(generator, store, PipelineConfig::default())
    }

    pub fn with_config(generator: Arc<G>, store: Arc<S>, config: PipelineConfig) -> Self {
        Self {
            generator,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate and run a raw `{step, data}` payload.
    ///
    /// Boundary failures (unknown step, malformed or invalid payload) emit a
    /// single `error` event with zero side effects.
    pub async fn dispatch(
        &self,
        payload: serde_json::Value,
        channel: &ProgressChannel,
    ) -> PipelineReport {
        self.dispatch_with_cancel(payload, channel, &CancelToken::new())
            .await
    }

    /// [`dispatch`](Self::dispatch) with a caller-held cancellation token, so
    /// an outer transport (an SSE handler observing client disconnect, say)
    /// can stop an in-flight invocation.
    #[instrument(skip_all)]
    pub async fn dispatch_with_cancel(
        &self,
        payload: serde_json::Value,
        channel: &ProgressChannel,
        cancel: &CancelToken,
    ) -> PipelineReport {
        match GenerationRequest::from_value(payload) {
            Ok(request) => self.run_with_cancel(request, channel, cancel).await,
            Err(err) => {
                tracing::warn!(error = %err, "request rejected at the boundary");
                let message = err.to_string();
                channel.emit(PipelineEvent::error(message.clone()));
                PipelineReport {
                    usage: UsageMetrics::default(),
                    error: Some(message),
                }
            }
        }
    }

    /// Run an already-validated request under the configured deadline.
    pub async fn run(
        &self,
        request: GenerationRequest,
        channel: &ProgressChannel,
    ) -> PipelineReport {
        self.run_with_cancel(request, channel, &CancelToken::new())
            .await
    }

    /// [`run`](Self::run) with a caller-held cancellation token.
    #[instrument(skip_all, fields(step = request.step()))]
    pub async fn run_with_cancel(
        &self,
        request: GenerationRequest,
        channel: &ProgressChannel,
        cancel: &CancelToken,
    ) -> PipelineReport {
        let usage = UsageAccumulator::new();

        let outcome = {
            let ctx = PhaseContext {
                channel,
                usage: &usage,
                cancel,
                config: &self.config,
            };
            self.run_with_deadline(&request, &ctx, cancel).await
        };

        // The accumulator is read only after the phase future has resolved.
        let usage = usage.snapshot();
        let error = match outcome {
            Ok(()) => None,
            Err(err) => {
                tracing::error!(step = request.step(), error = %err, "pipeline invocation failed");
                let message = err.to_string();
                channel.emit(PipelineEvent::error(message.clone()));
                Some(message)
            }
        };
        PipelineReport { usage, error }
    }

    /// Run the phase future under the overall deadline. When the deadline
    /// trips, the cancel token is set and the phase gets a short grace window
    /// to link already-completed work before the future is dropped.
    ///
    /// A phase that resolves `Ok` inside the grace window has already emitted
    /// its terminal event, so its completion is honored; the stream carries
    /// exactly one terminal event either way.
    async fn run_with_deadline(
        &self,
        request: &GenerationRequest,
        ctx: &PhaseContext<'_>,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        let phase = self.run_phase(request, ctx);
        tokio::pin!(phase);

        match tokio::time::timeout(self.config.overall_deadline, &mut phase).await {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.cancel();
                tracing::warn!(
                    deadline = ?self.config.overall_deadline,
                    "pipeline deadline exceeded; cancelling"
                );
                match tokio::time::timeout(self.config.cancel_grace, &mut phase).await {
                    Ok(Ok(())) => {
                        tracing::info!("phase completed inside the grace window");
                        Ok(())
                    }
                    // The phase observed the token; report the deadline that
                    // tripped it rather than the generic cancellation.
                    Ok(Err(PipelineError::Phase(PhaseError::Cancelled))) | Err(_) => Err(
                        PipelineError::DeadlineExceeded(self.config.overall_deadline),
                    ),
                    Ok(Err(other)) => Err(other),
                }
            }
        }
    }

    async fn run_phase(
        &self,
        request: &GenerationRequest,
        ctx: &PhaseContext<'_>,
    ) -> Result<(), PipelineError> {
        match request {
            GenerationRequest::GenerateStructure(request) => {
                OutlineGenerator::new(self.generator.as_ref())
                    .run(request, ctx)
                    .await
                    .map(drop)
                    .map_err(PipelineError::from)
            }
            GenerationRequest::ApproveStructure(request) => {
                OutlineApprover::new(self.store.as_ref())
                    .run(request, ctx)
                    .await
                    .map(drop)
                    .map_err(PipelineError::from)
            }
            GenerationRequest::GenerateContent(request) => {
                ContentExpander::new(self.generator.as_ref(), self.store.as_ref())
                    .run(request, ctx)
                    .await
                    .map(drop)
                    .map_err(PipelineError::from)
            }
        }
    }
}
