//! Typed progress events and the single-producer channel that carries them.
//!
//! Every phase pushes [`PipelineEvent`]s through a [`ProgressChannel`]; the
//! listener consumes the paired [`ProgressStream`] until the pipeline
//! function returns and the transport closes.

pub mod channel;
pub mod event;
pub mod gauge;

pub use channel::{ProgressChannel, ProgressStream};
pub use event::{
    ExpansionMetrics, LessonRef, PipelineEvent, STEP_APPROVE_STRUCTURE, STEP_GENERATE_CONTENT,
    STEP_GENERATE_STRUCTURE,
};
pub use gauge::ProgressGauge;
