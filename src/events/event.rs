use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::UsageMetrics;
use crate::outline::OutlineStructure;
use crate::store::{CourseId, LessonId};

/// Step label attached to phase-1 events.
pub const STEP_GENERATE_STRUCTURE: &str = "generate_structure";
/// Step label attached to phase-2 events.
pub const STEP_APPROVE_STRUCTURE: &str = "approve_structure";
/// Step label attached to phase-3 events.
pub const STEP_GENERATE_CONTENT: &str = "generate_content";

/// A typed event pushed to the pipeline's progress stream.
///
/// The serialized form is the wire contract the client depends on: each event
/// is a JSON object tagged by a kebab-case `type` field, with camelCase
/// payload fields.
///
/// # Examples
///
/// ```
/// use courseforge::events::PipelineEvent;
///
/// let event = PipelineEvent::error("boom");
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["type"], "error");
/// assert_eq!(json["error"], "boom");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PipelineEvent {
    /// Generic per-step progress heartbeat.
    #[serde(rename_all = "camelCase")]
    Progress {
        step: String,
        progress: f64,
        label: String,
        current_step: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_lesson: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_lessons: Option<usize>,
    },
    /// A partial outline observed mid-stream during phase 1.
    #[serde(rename_all = "camelCase")]
    StructureProgress {
        partial_structure: Value,
        chapter_count: usize,
        lesson_count: usize,
        progress: f64,
    },
    /// Terminal phase-1 event carrying the final outline.
    #[serde(rename_all = "camelCase")]
    StructureComplete {
        structure: OutlineStructure,
        step: String,
        progress: f64,
        usage: UsageMetrics,
    },
    /// Terminal phase-2 event echoing the approved structure.
    #[serde(rename_all = "camelCase")]
    CourseCreated {
        course_id: CourseId,
        structure: OutlineStructure,
        step: String,
        progress: f64,
    },
    /// One leaf succeeded during phase 3.
    #[serde(rename_all = "camelCase")]
    LessonCreated {
        lesson_id: LessonId,
        lesson_title: String,
        chapter_title: String,
        current_lesson: usize,
        total_lessons: usize,
    },
    /// One leaf failed during phase 3; iteration continues.
    #[serde(rename_all = "camelCase")]
    LessonError { lesson_title: String, error: String },
    /// Terminal phase-3 event with the expansion summary.
    #[serde(rename_all = "camelCase")]
    Complete {
        step: String,
        course_id: CourseId,
        results: Vec<LessonRef>,
        metrics: ExpansionMetrics,
    },
    /// Terminal failure event. At most one per pipeline invocation.
    Error { error: String },
}

/// Reference to one successfully generated lesson in a `complete` payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub lesson_id: LessonId,
    pub title: String,
    pub chapter_title: String,
}

/// Summary counters carried by the terminal `complete` event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionMetrics {
    /// Wall-clock duration of the expansion run, in milliseconds.
    pub duration: u64,
    pub succeeded: usize,
    pub failed: usize,
}

impl PipelineEvent {
    pub fn progress(
        step: impl Into<String>,
        progress: f64,
        label: impl Into<String>,
        current_step: impl Into<String>,
    ) -> Self {
        PipelineEvent::Progress {
            step: step.into(),
            progress,
            label: label.into(),
            current_step: current_step.into(),
            current_lesson: None,
            total_lessons: None,
        }
    }

    pub fn lesson_progress(
        progress: f64,
        label: impl Into<String>,
        current_lesson: usize,
        total_lessons: usize,
    ) -> Self {
        PipelineEvent::Progress {
            step: STEP_GENERATE_CONTENT.to_string(),
            progress,
            label: label.into(),
            current_step: "lesson-generation".to_string(),
            current_lesson: Some(current_lesson),
            total_lessons: Some(total_lessons),
        }
    }

    pub fn structure_progress(
        partial_structure: Value,
        chapter_count: usize,
        lesson_count: usize,
        progress: f64,
    ) -> Self {
        PipelineEvent::StructureProgress {
            partial_structure,
            chapter_count,
            lesson_count,
            progress,
        }
    }

    pub fn structure_complete(structure: OutlineStructure, usage: UsageMetrics) -> Self {
        PipelineEvent::StructureComplete {
            structure,
            step: STEP_GENERATE_STRUCTURE.to_string(),
            progress: 100.0,
            usage,
        }
    }

    pub fn course_created(course_id: CourseId, structure: OutlineStructure) -> Self {
        PipelineEvent::CourseCreated {
            course_id,
            structure,
            step: STEP_APPROVE_STRUCTURE.to_string(),
            progress: 100.0,
        }
    }

    pub fn lesson_created(
        lesson_id: LessonId,
        lesson_title: impl Into<String>,
        chapter_title: impl Into<String>,
        current_lesson: usize,
        total_lessons: usize,
    ) -> Self {
        PipelineEvent::LessonCreated {
            lesson_id,
            lesson_title: lesson_title.into(),
            chapter_title: chapter_title.into(),
            current_lesson,
            total_lessons,
        }
    }

    pub fn lesson_error(lesson_title: impl Into<String>, error: impl Into<String>) -> Self {
        PipelineEvent::LessonError {
            lesson_title: lesson_title.into(),
            error: error.into(),
        }
    }

    pub fn complete(
        course_id: CourseId,
        results: Vec<LessonRef>,
        metrics: ExpansionMetrics,
    ) -> Self {
        PipelineEvent::Complete {
            step: STEP_GENERATE_CONTENT.to_string(),
            course_id,
            results,
            metrics,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        PipelineEvent::Error {
            error: error.into(),
        }
    }

    /// Wire tag of this event (`type` field of the serialized form).
    pub fn tag(&self) -> &'static str {
        match self {
            PipelineEvent::Progress { .. } => "progress",
            PipelineEvent::StructureProgress { .. } => "structure-progress",
            PipelineEvent::StructureComplete { .. } => "structure-complete",
            PipelineEvent::CourseCreated { .. } => "course-created",
            PipelineEvent::LessonCreated { .. } => "lesson-created",
            PipelineEvent::LessonError { .. } => "lesson-error",
            PipelineEvent::Complete { .. } => "complete",
            PipelineEvent::Error { .. } => "error",
        }
    }

    /// True for events that end a pipeline invocation's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::StructureComplete { .. }
                | PipelineEvent::CourseCreated { .. }
                | PipelineEvent::Complete { .. }
                | PipelineEvent::Error { .. }
        )
    }

    /// Progress percentage carried by this event, if any.
    pub fn progress_value(&self) -> Option<f64> {
        match self {
            PipelineEvent::Progress { progress, .. }
            | PipelineEvent::StructureProgress { progress, .. }
            | PipelineEvent::StructureComplete { progress, .. }
            | PipelineEvent::CourseCreated { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// Serialize to the wire JSON object with an added RFC 3339 `at` timestamp.
    ///
    /// The tagged payload itself is unchanged; `at` records emission time for
    /// logging transports that want it.
    pub fn to_json_value(&self) -> Value {
        self.to_json_value_at(Utc::now())
    }

    pub(crate) fn to_json_value_at(&self, at: DateTime<Utc>) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "type": "error", "error": "event serialization failed" })
        });
        if let Some(object) = value.as_object_mut() {
            object.insert("at".to_string(), Value::String(at.to_rfc3339()));
        }
        value
    }
}
