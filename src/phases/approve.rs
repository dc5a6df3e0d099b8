//! Phase 2: persist an approved outline as a course with ordered, empty
//! chapters.

use tracing::instrument;

use super::{PhaseContext, PhaseError};
use crate::events::PipelineEvent;
use crate::request::ApproveStructureRequest;
use crate::store::{
    ChapterId, CourseId, DocumentStore, PersistedChapter, PersistedCourse, slugify,
};

/// Projects an approved [`OutlineStructure`](crate::outline::OutlineStructure)
/// into persistence: one unpublished, enrollment-closed course owning one
/// chapter per outline chapter, `order` equal to its index and
/// `lesson_order_ids` empty. Lessons stay unpopulated until expansion.
pub struct OutlineApprover<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> OutlineApprover<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Build the course in memory and persist it in a single round-trip.
    ///
    /// There is no retry and no compensating cleanup: if the save fails,
    /// nothing was committed and nothing is visible to the client.
    #[instrument(skip_all, fields(title = %request.structure.title))]
    pub async fn run(
        &self,
        request: &ApproveStructureRequest,
        ctx: &PhaseContext<'_>,
    ) -> Result<CourseId, PhaseError> {
        let structure = &request.structure;
        let chapters = structure
            .chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| PersistedChapter {
                id: ChapterId::new(),
                title: chapter.title.clone(),
                description: chapter.description.clone(),
                order: index as u32,
                lesson_order_ids: Vec::new(),
            })
            .collect();

        let course = PersistedCourse {
            id: CourseId::new(),
            title: structure.title.clone(),
            slug: slugify(&structure.title),
            owner_id: ctx.config.default_owner_id.clone(),
            level: structure.level,
            duration_in_weeks: structure.duration_in_weeks,
            published: false,
            enrollment_open: false,
            chapters,
        };

        self.store.create_course(&course).await?;
        tracing::info!(course_id = %course.id, chapters = course.chapters.len(), "course created");

        ctx.channel
            .emit(PipelineEvent::course_created(course.id, structure.clone()));
        Ok(course.id)
    }
}
