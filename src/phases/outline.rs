//! Phase 1: stream a structured course outline, estimating progress from the
//! partial chapter and lesson counts.

use futures_util::StreamExt;
use tracing::instrument;

use super::{PhaseContext, PhaseError};
use crate::events::{PipelineEvent, ProgressGauge, STEP_GENERATE_STRUCTURE};
use crate::generation::{GenerationError, GenerationService, OutlineChunk};
use crate::outline::{OutlineStructure, partial_counts};
use crate::prompts;
use crate::request::GenerateStructureRequest;

/// Progress floor once the structured stream starts delivering partials; the
/// span below it covers prompt assembly and the optional research call.
const STREAM_BASE_PROGRESS: f64 = 40.0;
/// Share of the bar the partial-count heuristic can fill.
const STREAM_PROGRESS_SPAN: f64 = 50.0;

/// Drives the structured-outline stream. Performs zero persistence; all
/// output of this phase is streamed.
pub struct OutlineGenerator<'a, G: GenerationService + ?Sized> {
    generator: &'a G,
}

impl<'a, G: GenerationService + ?Sized> OutlineGenerator<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    /// Run the phase and return the final outline.
    ///
    /// The research sub-call is best-effort: a failure is logged and the
    /// phase proceeds without the augmentation. A hard failure of the
    /// structured stream itself propagates; this phase has no partial
    /// success.
    #[instrument(skip_all, fields(title = %request.title))]
    pub async fn run(
        &self,
        request: &GenerateStructureRequest,
        ctx: &PhaseContext<'_>,
    ) -> Result<OutlineStructure, PhaseError> {
        let mut gauge = ProgressGauge::new();
        ctx.channel.emit(PipelineEvent::progress(
            STEP_GENERATE_STRUCTURE,
            gauge.advance(5.0),
            "Preparing outline generation",
            "outline-prompt",
        ));

        let research = if request.use_web_search {
            match self
                .generator
                .research(&prompts::research_query(&request.title))
                .await
            {
                Ok(text) => Some(text),
                Err(err) => {
                    tracing::warn!(error = %err, "research augmentation failed; continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let prompt = prompts::outline_prompt(request, research.as_deref());
        let mut stream = self
            .generator
            .stream_structured_outline(&prompt)
            .await
            .map_err(PhaseError::OutlineGeneration)?;

        let typical_chapters = f64::from(ctx.config.typical_chapter_count.max(1));
        let mut final_outline = None;

        while let Some(chunk) = stream.next().await {
            match chunk.map_err(PhaseError::OutlineGeneration)? {
                OutlineChunk::Partial(partial) => {
                    // Partials without a non-empty chapter list carry no
                    // progress signal.
                    let Some((chapter_count, lesson_count)) = partial_counts(&partial) else {
                        continue;
                    };
                    let raw = STREAM_BASE_PROGRESS
                        + ((chapter_count as f64 / typical_chapters) * STREAM_PROGRESS_SPAN)
                            .min(STREAM_PROGRESS_SPAN);
                    let progress = gauge.advance(raw);
                    ctx.channel.emit(PipelineEvent::structure_progress(
                        partial,
                        chapter_count,
                        lesson_count,
                        progress,
                    ));
                }
                OutlineChunk::Final { outline, usage } => {
                    ctx.usage.record(&usage);
                    final_outline = Some(outline);
                }
            }
        }

        let outline = final_outline
            .ok_or(PhaseError::OutlineGeneration(GenerationError::MissingFinal))?;
        tracing::debug!(
            chapters = outline.chapters.len(),
            lessons = outline.total_lessons(),
            "outline stream complete"
        );
        ctx.channel.emit(PipelineEvent::structure_complete(
            outline.clone(),
            ctx.usage.snapshot(),
        ));
        Ok(outline)
    }
}
