//! Phase 3: expand every (chapter, lesson) leaf of an approved outline into
//! full content, isolating failures per leaf.
//!
//! Iteration order is fixed by a pure planning step so the generation runner
//! and the ordering logic stay independently testable. Leaf generation calls
//! are issued strictly sequentially, one in flight at a time; that is a
//! deliberate bound on external-API concurrency, not an oversight.

use std::time::Instant;

use futures_util::StreamExt;
use tracing::instrument;

use super::{PhaseContext, PhaseError};
use crate::events::{ExpansionMetrics, LessonRef, PipelineEvent, ProgressGauge};
use crate::generation::{GenerationError, GenerationService};
use crate::outline::{FieldIssue, LessonOutline, OutlineStructure};
use crate::prompts;
use crate::request::GenerateContentRequest;
use crate::store::{
    CourseId, DocumentStore, LessonDocument, LessonId, LessonKind, PersistedLesson, slugify,
};

/// Progress floor of the expansion loop.
const EXPAND_BASE_PROGRESS: f64 = 5.0;
/// Share of the bar the per-leaf counter fills.
const EXPAND_PROGRESS_SPAN: f64 = 85.0;

/// One unit of expansion work: a (chapter, lesson) pair with everything the
/// prompt builder needs.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafWorkItem {
    /// 1-based visit index across the whole outline.
    pub ordinal: usize,
    pub chapter_index: usize,
    pub lesson_index: usize,
    pub chapter_title: String,
    pub chapter_description: String,
    pub lesson: LessonOutline,
}

/// Flatten an outline into its leaves, left to right: chapters in order, then
/// each chapter's lessons in order.
pub fn plan_leaves(structure: &OutlineStructure) -> Vec<LeafWorkItem> {
    let mut leaves = Vec::with_capacity(structure.total_lessons());
    let mut ordinal = 0;
    for (chapter_index, chapter) in structure.chapters.iter().enumerate() {
        for (lesson_index, lesson) in chapter.lessons.iter().enumerate() {
            ordinal += 1;
            leaves.push(LeafWorkItem {
                ordinal,
                chapter_index,
                lesson_index,
                chapter_title: chapter.title.clone(),
                chapter_description: chapter.description.clone(),
                lesson: lesson.clone(),
            });
        }
    }
    leaves
}

/// Outcome of one expansion run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpansionResult {
    pub course_id: CourseId,
    /// One entry per *successful* leaf, in visit order.
    pub lessons: Vec<LessonRef>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl ExpansionResult {
    pub fn metrics(&self) -> ExpansionMetrics {
        ExpansionMetrics {
            duration: self.duration_ms,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

/// Runs the expansion loop over the planned leaves.
pub struct ContentExpander<'a, G: ?Sized, S: ?Sized> {
    generator: &'a G,
    store: &'a S,
}

impl<'a, G, S> ContentExpander<'a, G, S>
where
    G: GenerationService + ?Sized,
    S: DocumentStore + ?Sized,
{
    pub fn new(generator: &'a G, store: &'a S) -> Self {
        Self { generator, store }
    }

    /// Visit every leaf in order, generate its content, and link successful
    /// lessons into their chapter's `lesson_order_ids`.
    ///
    /// A failed leaf is counted, reported via `lesson-error`, and skipped; it
    /// never stops iteration. The course document is written exactly once,
    /// after all leaves are visited, capturing every append across all
    /// chapters. That save is an idempotent full-document write retried once;
    /// if it still fails, the generated lesson ids are logged as orphaned and
    /// the failure surfaces as the phase error.
    #[instrument(skip_all, fields(course_id = %request.course_id))]
    pub async fn run(
        &self,
        request: &GenerateContentRequest,
        ctx: &PhaseContext<'_>,
    ) -> Result<ExpansionResult, PhaseError> {
        let started = Instant::now();

        // Defensive re-validation: the structure round-trips through the
        // client between approval and expansion.
        if let Err(issues) = request.structure.validate() {
            return Err(PhaseError::InvalidStructure { issues });
        }

        let mut course = self
            .store
            .find_course(request.course_id)
            .await?
            .ok_or(PhaseError::CourseNotFound(request.course_id))?;

        if course.chapters.len() != request.structure.chapters.len() {
            return Err(PhaseError::InvalidStructure {
                issues: vec![FieldIssue::new(
                    "chapters",
                    format!(
                        "outline has {} chapters but course {} has {}",
                        request.structure.chapters.len(),
                        course.id,
                        course.chapters.len()
                    ),
                )],
            });
        }

        let leaves = plan_leaves(&request.structure);
        let total_lessons = leaves.len();
        let mut gauge = ProgressGauge::new();
        let mut lessons = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = false;

        for leaf in &leaves {
            if ctx.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let progress = gauge.advance(
                EXPAND_BASE_PROGRESS
                    + (leaf.ordinal as f64 / total_lessons as f64) * EXPAND_PROGRESS_SPAN,
            );
            ctx.channel.emit(PipelineEvent::lesson_progress(
                progress,
                format!("Generating: {}", leaf.lesson.title),
                leaf.ordinal,
                total_lessons,
            ));

            let prompt = prompts::lesson_prompt(
                &course.title,
                &leaf.chapter_title,
                &leaf.chapter_description,
                &leaf.lesson,
                request.include_quizzes,
                request.additional_prompt.as_deref(),
            );

            match self.generate_leaf(&prompt, request.use_web_search, ctx).await {
                Ok(body) => {
                    let lesson = PersistedLesson {
                        id: LessonId::new(),
                        title: leaf.lesson.title.clone(),
                        slug: slugify(&leaf.lesson.title),
                        content: LessonDocument::markdown(body),
                        kind: LessonKind::Text,
                        downloadable: false,
                        requires_enrollment: true,
                        published: false,
                    };
                    match self.store.create_lesson(&lesson).await {
                        Ok(()) => {
                            course.chapters[leaf.chapter_index]
                                .lesson_order_ids
                                .push(lesson.id);
                            succeeded += 1;
                            lessons.push(LessonRef {
                                lesson_id: lesson.id,
                                title: leaf.lesson.title.clone(),
                                chapter_title: leaf.chapter_title.clone(),
                            });
                            ctx.channel.emit(PipelineEvent::lesson_created(
                                lesson.id,
                                leaf.lesson.title.clone(),
                                leaf.chapter_title.clone(),
                                leaf.ordinal,
                                total_lessons,
                            ));
                        }
                        Err(err) => {
                            failed += 1;
                            tracing::warn!(
                                lesson = %leaf.lesson.title,
                                error = %err,
                                "lesson persistence failed; continuing"
                            );
                            ctx.channel.emit(PipelineEvent::lesson_error(
                                leaf.lesson.title.clone(),
                                err.to_string(),
                            ));
                        }
                    }
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        lesson = %leaf.lesson.title,
                        error = %err,
                        "leaf generation failed; continuing"
                    );
                    ctx.channel.emit(PipelineEvent::lesson_error(
                        leaf.lesson.title.clone(),
                        err.to_string(),
                    ));
                }
            }
        }

        // One write captures every append. Retried once; a second failure
        // leaves the generated lessons orphaned, so log their ids for a later
        // relink.
        if let Err(first) = self.store.save_course(&course).await {
            tracing::warn!(error = %first, "final course save failed; retrying once");
            tokio::time::sleep(ctx.config.save_retry_delay).await;
            if let Err(second) = self.store.save_course(&course).await {
                let orphaned: Vec<String> = lessons
                    .iter()
                    .map(|lesson| lesson.lesson_id.to_string())
                    .collect();
                tracing::warn!(
                    course_id = %course.id,
                    ?orphaned,
                    "course save failed after retry; generated lessons are unlinked"
                );
                return Err(PhaseError::Persistence(second));
            }
        }

        if cancelled {
            tracing::info!(course_id = %course.id, succeeded, failed, "expansion cancelled between leaves");
            return Err(PhaseError::Cancelled);
        }

        let result = ExpansionResult {
            course_id: course.id,
            lessons,
            succeeded,
            failed,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            course_id = %course.id,
            succeeded,
            failed,
            duration_ms = result.duration_ms,
            "expansion complete"
        );
        ctx.channel.emit(PipelineEvent::complete(
            result.course_id,
            result.lessons.clone(),
            result.metrics(),
        ));
        Ok(result)
    }

    /// Generate one leaf's content: a single augmented call when web search
    /// is requested, otherwise a token stream concatenated into the final
    /// text. Either failure mode is returned to the caller for per-leaf
    /// handling.
    async fn generate_leaf(
        &self,
        prompt: &str,
        use_web_search: bool,
        ctx: &PhaseContext<'_>,
    ) -> Result<String, GenerationError> {
        if use_web_search {
            let generated = self.generator.generate_once(prompt).await?;
            ctx.usage.record(&generated.usage);
            return Ok(generated.text);
        }

        let mut stream = self.generator.stream_tokens(prompt).await?;
        let mut body = String::new();
        while let Some(chunk) = stream.next().await {
            body.push_str(&chunk?);
        }
        Ok(body)
    }
}
