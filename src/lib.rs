//! # Courseforge: streamed course-content generation pipeline
//!
//! Courseforge orchestrates a three-phase workflow for turning a course idea
//! into persisted content, pushing typed progress events to one listener the
//! whole way through:
//!
//! 1. **Structure**: drive a structured-object stream from a generation
//!    service into a hierarchical course outline, estimating progress from
//!    the partial chapter/lesson counts.
//! 2. **Approval**: persist an approved outline as a course with ordered,
//!    still-empty chapters, in a single write.
//! 3. **Expansion**: visit every (chapter, lesson) leaf in order, generate
//!    its content, and link it into the course; a failed leaf is reported and
//!    skipped, never aborting the batch.
//!
//! The generation service and the document store are injected capabilities
//! ([`generation::GenerationService`], [`store::DocumentStore`]), so every
//! phase is testable against scripted mocks.
//!
//! ## Consuming the event stream
//!
//! ```
//! use courseforge::events::{PipelineEvent, ProgressChannel};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (channel, stream) = ProgressChannel::unbounded();
//!
//! channel.emit(PipelineEvent::error("request validation failed: title: must not be empty"));
//! drop(channel); // pipeline returned; transport closes
//!
//! let events = stream.collect_all().await;
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].tag(), "error");
//! # });
//! ```
//!
//! ## Wire contract
//!
//! Serialized events are tagged JSON objects (`type` in kebab-case, payload
//! fields in camelCase):
//!
//! ```
//! use courseforge::events::PipelineEvent;
//!
//! let event = PipelineEvent::lesson_error("Ownership", "provider unavailable");
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json["type"], "lesson-error");
//! assert_eq!(json["lessonTitle"], "Ownership");
//! ```
//!
//! ## Failure semantics
//!
//! Every failure that escapes a phase is folded by the orchestrator into
//! exactly one terminal `error` event inside the stream; the transport always
//! looks healthy once streaming begins. The single exception category
//! designed for partial success is the per-leaf generation failure of the
//! expansion phase, reported as `lesson-error` while iteration continues.
//!
//! ## Module guide
//!
//! - [`events`]: typed events, the progress channel, and the monotonic gauge
//! - [`outline`]: the ephemeral outline model and its validation
//! - [`request`]: the tagged request union validated at the boundary
//! - [`generation`] / [`store`]: the injected capabilities
//! - [`phases`]: the three phase implementations
//! - [`orchestrator`]: dispatch, deadline, and error folding
//! - [`config`] / [`telemetry`]: runtime configuration and tracing bootstrap

pub mod config;
pub mod control;
pub mod events;
pub mod generation;
pub mod orchestrator;
pub mod outline;
pub mod phases;
pub mod prompts;
pub mod request;
pub mod store;
pub mod telemetry;
