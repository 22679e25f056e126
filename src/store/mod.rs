//! Persistence seam for the progress engine.
//!
//! Handlers and the engine only talk to [`ProgressStore`]; production runs
//! on [`PgStore`], tests and the demo mode run on [`MemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Course, CourseDetail, CourseFilter, Enrollment, Lesson, LessonProgress, NewQuizAttempt,
    QuizAttempt,
};

mod memory;
mod postgres;

pub use memory::{MemoryStore, Seed};
pub use postgres::PgStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    /// A row could not be mapped into its domain type.
    #[error("corrupt {entity} row {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: Uuid,
        reason: String,
    },
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    // === Catalog ===

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>>;

    /// Published courses matching `filter`, newest first, with lesson counts.
    async fn list_published_courses(&self, filter: &CourseFilter) -> Result<Vec<CourseDetail>>;

    /// Lessons of a course by ascending `order`, ties by creation then id.
    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>>;

    // === Enrollments ===

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>>;

    /// Fails with [`StoreError::Duplicate`] when the pair is already enrolled.
    async fn create_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment>;

    async fn enrollments_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>>;

    /// Persist the engine-owned fields: percentage, status, completed_at,
    /// last_accessed_at.
    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> Result<()>;

    // === Lesson progress ===

    async fn lesson_progress(&self, enrollment_id: Uuid) -> Result<Vec<LessonProgress>>;

    /// Fetch-or-create the row for the pair and mark it completed at `now`.
    async fn complete_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress>;

    /// Distinct completed rows for the enrollment.
    async fn count_completed(&self, enrollment_id: Uuid) -> Result<i64>;

    // === Quiz attempts ===

    /// All attempts of the enrollment, oldest first.
    async fn quiz_attempts(&self, enrollment_id: Uuid) -> Result<Vec<QuizAttempt>>;

    /// Attempts for one lesson, newest first.
    async fn quiz_attempts_for_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Vec<QuizAttempt>>;

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttempt>;
}
