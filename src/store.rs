//! Persisted entities and the document-store capability.
//!
//! The pipeline owns the ordering and linkage invariants, not the storage
//! engine: a course exclusively owns its ordered chapters, a chapter's
//! `lesson_order_ids` only ever grows by appends in visit order, and a lesson
//! is referenced by exactly one chapter. The backing store is an injected
//! [`DocumentStore`]; [`MemoryStore`] is the in-crate reference
//! implementation used by demos and tests.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::outline::CourseLevel;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identity of a persisted course.
    CourseId
);
entity_id!(
    /// Identity of a persisted chapter.
    ChapterId
);
entity_id!(
    /// Identity of a persisted lesson.
    LessonId
);

/// A course created by the approval phase. Created unpublished and closed for
/// enrollment; this pipeline never deletes one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCourse {
    pub id: CourseId,
    pub title: String,
    pub slug: String,
    pub owner_id: String,
    pub level: CourseLevel,
    pub duration_in_weeks: u32,
    pub published: bool,
    pub enrollment_open: bool,
    /// Exclusively owned, ordered by `order`.
    pub chapters: Vec<PersistedChapter>,
}

/// A chapter embedded in a [`PersistedCourse`]. `order` equals the index the
/// chapter was created at during approval.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChapter {
    pub id: ChapterId,
    pub title: String,
    pub description: String,
    pub order: u32,
    /// Append-only, in expansion visit order. A failed leaf appends nothing.
    pub lesson_order_ids: Vec<LessonId>,
}

/// Content category of a persisted lesson.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    #[default]
    Text,
    Video,
    Quiz,
}

/// Structured lesson content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LessonDocument {
    pub format: String,
    pub body: String,
}

impl LessonDocument {
    pub fn markdown(body: impl Into<String>) -> Self {
        Self {
            format: "markdown".to_string(),
            body: body.into(),
        }
    }
}

/// A lesson created by the expansion phase, one per successful leaf.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLesson {
    pub id: LessonId,
    pub title: String,
    pub slug: String,
    pub content: LessonDocument,
    pub kind: LessonKind,
    pub downloadable: bool,
    pub requires_enrollment: bool,
    pub published: bool,
}

/// Errors surfaced by a document-store backend.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("document store error: {0}")]
    #[diagnostic(code(courseforge::store::backend))]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }
}

/// Capability the pipeline needs from persistence: create, find by id, and a
/// full-document save. Saves are expected to be idempotent upserts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_course(&self, course: &PersistedCourse) -> Result<(), StoreError>;

    async fn find_course(&self, id: CourseId) -> Result<Option<PersistedCourse>, StoreError>;

    async fn create_lesson(&self, lesson: &PersistedLesson) -> Result<(), StoreError>;

    /// Idempotent full-document write of a course, chapters included.
    async fn save_course(&self, course: &PersistedCourse) -> Result<(), StoreError>;
}

/// Derive a URL-safe slug from a title.
///
/// # Examples
///
/// ```
/// use courseforge::store::slugify;
///
/// assert_eq!(slugify("Intro to Rust: Ownership & Borrowing"), "intro-to-rust-ownership-borrowing");
/// assert_eq!(slugify("   "), "untitled");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut previous_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            previous_dash = false;
        } else if !previous_dash {
            slug.push('-');
            previous_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// In-memory [`DocumentStore`] with write accounting and save-failure
/// injection, used by demos and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: Mutex<FxHashMap<CourseId, PersistedCourse>>,
    lessons: Mutex<FxHashMap<LessonId, PersistedLesson>>,
    writes: AtomicUsize,
    failing_saves: AtomicUsize,
    save_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write round-trips (creates and saves) performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls to `save_course` fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Make every subsequent `save_course` call take this long.
    pub fn delay_saves(&self, delay: Duration) {
        *self.save_delay.lock() = Some(delay);
    }

    pub fn course(&self, id: CourseId) -> Option<PersistedCourse> {
        self.courses.lock().get(&id).cloned()
    }

    pub fn lesson(&self, id: LessonId) -> Option<PersistedLesson> {
        self.lessons.lock().get(&id).cloned()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.lock().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_course(&self, course: &PersistedCourse) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.courses.lock().insert(course.id, course.clone());
        Ok(())
    }

    async fn find_course(&self, id: CourseId) -> Result<Option<PersistedCourse>, StoreError> {
        Ok(self.courses.lock().get(&id).cloned())
    }

    async fn create_lesson(&self, lesson: &PersistedLesson) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lessons.lock().insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn save_course(&self, course: &PersistedCourse) -> Result<(), StoreError> {
        let delay = *self.save_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(StoreError::backend("injected save failure"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.courses.lock().insert(course.id, course.clone());
        Ok(())
    }
}
