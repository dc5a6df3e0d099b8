//! The three pipeline phases: outline generation, outline approval, and
//! content expansion.
//!
//! Phases are plain structs over borrowed capabilities, invoked once per
//! request by the orchestrator with a shared [`PhaseContext`]. A phase never
//! emits the terminal `error` event itself; it returns a [`PhaseError`] and
//! the orchestrator folds it into exactly one event at the boundary.

pub mod approve;
pub mod expand;
pub mod outline;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::control::CancelToken;
use crate::events::ProgressChannel;
use crate::generation::{GenerationError, UsageAccumulator};
use crate::outline::{FieldIssue, summarize_issues};
use crate::store::{CourseId, StoreError};

pub use approve::OutlineApprover;
pub use expand::{ContentExpander, ExpansionResult, LeafWorkItem, plan_leaves};
pub use outline::OutlineGenerator;

/// Per-invocation environment shared by all phases.
pub struct PhaseContext<'a> {
    pub channel: &'a ProgressChannel,
    pub usage: &'a UsageAccumulator,
    pub cancel: &'a CancelToken,
    pub config: &'a PipelineConfig,
}

/// Phase-level failures. Each of these terminates the invocation's stream
/// with one `error` event; leaf-level generation failures never surface here.
#[derive(Debug, Error, Diagnostic)]
pub enum PhaseError {
    /// Hard failure of the structured-outline stream. Phase 1 has no partial
    /// success: it produces a final outline or nothing.
    #[error("outline generation failed: {0}")]
    #[diagnostic(code(courseforge::phase::outline_generation))]
    OutlineGeneration(#[source] GenerationError),

    /// A round-tripped structure failed the defensive re-validation.
    #[error("structure validation failed: {}", summarize_issues(.issues))]
    #[diagnostic(code(courseforge::phase::invalid_structure))]
    InvalidStructure { issues: Vec<FieldIssue> },

    /// The expansion target does not exist.
    #[error("course {0} not found")]
    #[diagnostic(code(courseforge::phase::course_not_found))]
    CourseNotFound(CourseId),

    #[error("persistence failed: {0}")]
    #[diagnostic(code(courseforge::phase::persistence))]
    Persistence(#[from] StoreError),

    /// The invocation was cancelled between leaves.
    #[error("generation cancelled")]
    #[diagnostic(code(courseforge::phase::cancelled))]
    Cancelled,
}
