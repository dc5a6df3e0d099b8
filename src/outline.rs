//! Outline data model: the hierarchical course structure produced by phase 1
//! and approved in phase 2.
//!
//! An [`OutlineStructure`] is ephemeral: it is streamed to the client, round-
//! tripped back for approval, and never itself persisted; only its approved
//! projection lives in the document store.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Difficulty level of a course outline.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// The hierarchical outline produced by the structure phase.
///
/// Serialized field names are camelCase to match the client wire contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineStructure {
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub level: CourseLevel,
    pub duration_in_weeks: u32,
    pub chapters: Vec<ChapterOutline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_takeaways: Option<Vec<String>>,
}

/// One chapter of an outline. `order` is dense, zero-based, and must match
/// the chapter's position in the parent sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOutline {
    pub title: String,
    pub description: String,
    pub order: u32,
    pub lessons: Vec<LessonOutline>,
}

/// One lesson of a chapter; a (chapter, lesson) pair is the unit of content
/// expansion and of failure isolation in phase 3.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonOutline {
    pub title: String,
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: u32,
}

/// A single field-level validation finding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Render a list of issues as a single `;`-joined summary line.
pub fn summarize_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(FieldIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OutlineStructure {
    /// Validate the semantic invariants a round-tripped outline must hold:
    /// non-empty titles, at least one chapter, a positive duration, and dense
    /// zero-based `order` fields matching sequence position.
    ///
    /// Returns every finding rather than stopping at the first, so the
    /// resulting `error` event carries field-level messages.
    pub fn validate(&self) -> Result<(), Vec<FieldIssue>> {
        let mut issues = Vec::new();

        if self.title.trim().is_empty() {
            issues.push(FieldIssue::new("title", "must not be empty"));
        }
        if self.duration_in_weeks == 0 {
            issues.push(FieldIssue::new("durationInWeeks", "must be at least 1"));
        }
        if self.chapters.is_empty() {
            issues.push(FieldIssue::new("chapters", "must contain at least one chapter"));
        }

        for (chapter_index, chapter) in self.chapters.iter().enumerate() {
            let chapter_field = format!("chapters[{chapter_index}]");
            if chapter.title.trim().is_empty() {
                issues.push(FieldIssue::new(
                    format!("{chapter_field}.title"),
                    "must not be empty",
                ));
            }
            if chapter.order as usize != chapter_index {
                issues.push(FieldIssue::new(
                    format!("{chapter_field}.order"),
                    format!("expected {chapter_index}, found {}", chapter.order),
                ));
            }
            for (lesson_index, lesson) in chapter.lessons.iter().enumerate() {
                let lesson_field = format!("{chapter_field}.lessons[{lesson_index}]");
                if lesson.title.trim().is_empty() {
                    issues.push(FieldIssue::new(
                        format!("{lesson_field}.title"),
                        "must not be empty",
                    ));
                }
                if lesson.order as usize != lesson_index {
                    issues.push(FieldIssue::new(
                        format!("{lesson_field}.order"),
                        format!("expected {lesson_index}, found {}", lesson.order),
                    ));
                }
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Total number of (chapter, lesson) leaves in this outline.
    pub fn total_lessons(&self) -> usize {
        self.chapters.iter().map(|chapter| chapter.lessons.len()).sum()
    }
}

/// Chapter and lesson counts visible in a streamed partial outline.
///
/// Partials arrive as loose JSON while the structured stream is still in
/// flight; a partial with no non-empty `chapters` array yields `None` and
/// produces no progress event.
///
/// # Examples
///
/// ```
/// use courseforge::outline::partial_counts;
/// use serde_json::json;
///
/// let partial = json!({
///     "title": "Intro to X",
///     "chapters": [
///         {"title": "One", "lessons": [{"title": "A"}, {"title": "B"}]},
///         {"title": "Two"},
///     ],
/// });
/// assert_eq!(partial_counts(&partial), Some((2, 2)));
/// assert_eq!(partial_counts(&json!({"title": "t"})), None);
/// ```
pub fn partial_counts(partial: &Value) -> Option<(usize, usize)> {
    let chapters = partial.get("chapters")?.as_array()?;
    if chapters.is_empty() {
        return None;
    }
    let lesson_count = chapters
        .iter()
        .map(|chapter| {
            chapter
                .get("lessons")
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        })
        .sum();
    Some((chapters.len(), lesson_count))
}
