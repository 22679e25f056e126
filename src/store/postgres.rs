use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{ProgressStore, Result, StoreError};
use crate::db::Db;
use crate::models::{
    Course, CourseDetail, CourseFilter, Enrollment, Lesson, LessonProgress, NewQuizAttempt, QuizAttempt,
};
use crate::quiz::{self, QuizQuestion};

const COURSE_COLUMNS: &str =
    "id, title, slug, description, category, difficulty_level, is_published, created_at";

const LESSON_COLUMNS: &str = "id, course_id, title, content_type, position, \
    quiz_passing_score, quiz_questions, created_at";

const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, status, progress_percentage, \
    enrolled_at, completed_at, last_accessed_at";

const PROGRESS_COLUMNS: &str =
    "id, enrollment_id, lesson_id, is_completed, started_at, completed_at";

const ATTEMPT_COLUMNS: &str = "id, enrollment_id, lesson_id, answers, score, points_earned, \
    points_possible, passed, submitted_at, time_spent_seconds";

#[derive(sqlx::FromRow)]
struct CourseListRow {
    #[sqlx(flatten)]
    course: Course,
    total_lessons: i64,
}

impl From<CourseListRow> for CourseDetail {
    fn from(row: CourseListRow) -> Self {
        CourseDetail {
            course: row.course,
            total_lessons: usize::try_from(row.total_lessons).unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    id: Uuid,
    course_id: Uuid,
    title: String,
    content_type: String,
    position: i32,
    quiz_passing_score: i32,
    quiz_questions: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LessonRow> for Lesson {
    type Error = StoreError;

    fn try_from(row: LessonRow) -> Result<Self> {
        let id = row.id;
        let corrupt = move |reason: String| StoreError::Corrupt {
            entity: "lesson",
            id,
            reason,
        };
        let content_type = row.content_type.parse().map_err(corrupt)?;
        // Non-quiz lessons may carry `[]` or `null` here.
        let quiz_questions: Vec<QuizQuestion> = match row.quiz_questions.0 {
            serde_json::Value::Null => Vec::new(),
            v => serde_json::from_value(v).map_err(|e| corrupt(e.to_string()))?,
        };
        quiz::validate_questions(&quiz_questions).map_err(|e| corrupt(e.to_string()))?;
        Ok(Lesson {
            id: row.id,
            course_id: row.course_id,
            title: row.title,
            content_type,
            order: row.position,
            quiz_passing_score: row.quiz_passing_score,
            quiz_questions,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    status: String,
    progress_percentage: f64,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    last_accessed_at: Option<DateTime<Utc>>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = StoreError;

    fn try_from(row: EnrollmentRow) -> Result<Self> {
        let status = row.status.parse().map_err(|reason| StoreError::Corrupt {
            entity: "enrollment",
            id: row.id,
            reason,
        })?;
        Ok(Enrollment {
            id: row.id,
            user_id: row.user_id,
            course_id: row.course_id,
            status,
            progress_percentage: row.progress_percentage,
            enrolled_at: row.enrolled_at,
            completed_at: row.completed_at,
            last_accessed_at: row.last_accessed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    enrollment_id: Uuid,
    lesson_id: Uuid,
    answers: Json<BTreeMap<i64, usize>>,
    score: f64,
    points_earned: i32,
    points_possible: i32,
    passed: bool,
    submitted_at: DateTime<Utc>,
    time_spent_seconds: i32,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            enrollment_id: row.enrollment_id,
            lesson_id: row.lesson_id,
            answers: row.answers.0,
            score: row.score,
            points_earned: row.points_earned,
            points_possible: row.points_possible,
            passed: row.passed,
            submitted_at: row.submitted_at,
            time_spent_seconds: row.time_spent_seconds,
        }
    }
}

/// sqlx-backed store over the tables created by `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        Ok(sqlx::query_as::<_, Course>(&query)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn list_published_courses(&self, filter: &CourseFilter) -> Result<Vec<CourseDetail>> {
        let query = format!(
            "SELECT {COURSE_COLUMNS},
                    (SELECT COUNT(*) FROM lessons l WHERE l.course_id = courses.id) AS total_lessons
             FROM courses
             WHERE is_published
               AND ($1::text IS NULL OR category = $1)
               AND ($2::text IS NULL OR difficulty_level = $2)
             ORDER BY created_at DESC, id ASC
             OFFSET $3 LIMIT $4"
        );
        Ok(sqlx::query_as::<_, CourseListRow>(&query)
            .bind(filter.category.as_deref())
            .bind(filter.difficulty.as_deref())
            .bind(i64::from(filter.skip))
            .bind(i64::from(filter.limit()))
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(CourseDetail::from)
            .collect())
    }

    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let query = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons
             WHERE course_id = $1
             ORDER BY position ASC, created_at ASC, id ASC"
        );
        sqlx::query_as::<_, LessonRow>(&query)
            .bind(course_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Lesson::try_from)
            .collect()
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 AND course_id = $2"
        );
        sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .map(Enrollment::try_from)
            .transpose()
    }

    async fn create_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let query = format!(
            "INSERT INTO enrollments (id, user_id, course_id, status, progress_percentage)
             VALUES ($1, $2, $3, 'active', 0)
             ON CONFLICT (user_id, course_id) DO NOTHING
             RETURNING {ENROLLMENT_COLUMNS}"
        );
        sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::Duplicate("enrollment"))
            .and_then(Enrollment::try_from)
    }

    async fn enrollments_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE user_id = $1
             ORDER BY enrolled_at ASC"
        );
        sqlx::query_as::<_, EnrollmentRow>(&query)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Enrollment::try_from)
            .collect()
    }

    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> Result<()> {
        sqlx::query(
            "UPDATE enrollments
             SET progress_percentage = $2, status = $3, completed_at = $4, last_accessed_at = $5
             WHERE id = $1",
        )
        .bind(enrollment.id)
        .bind(enrollment.progress_percentage)
        .bind(enrollment.status.as_str())
        .bind(enrollment.completed_at)
        .bind(enrollment.last_accessed_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn lesson_progress(&self, enrollment_id: Uuid) -> Result<Vec<LessonProgress>> {
        let query =
            format!("SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE enrollment_id = $1");
        Ok(sqlx::query_as::<_, LessonProgress>(&query)
            .bind(enrollment_id)
            .fetch_all(&self.db)
            .await?)
    }

    async fn complete_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        let query = format!(
            "INSERT INTO lesson_progress
                (id, enrollment_id, lesson_id, is_completed, started_at, completed_at)
             VALUES ($1, $2, $3, TRUE, $4, $4)
             ON CONFLICT (enrollment_id, lesson_id)
             DO UPDATE SET is_completed = TRUE, completed_at = EXCLUDED.completed_at
             RETURNING {PROGRESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, LessonProgress>(&query)
            .bind(Uuid::new_v4())
            .bind(enrollment_id)
            .bind(lesson_id)
            .bind(now)
            .fetch_one(&self.db)
            .await?)
    }

    async fn count_completed(&self, enrollment_id: Uuid) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lesson_progress WHERE enrollment_id = $1 AND is_completed",
        )
        .bind(enrollment_id)
        .fetch_one(&self.db)
        .await?)
    }

    async fn quiz_attempts(&self, enrollment_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let query = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
             WHERE enrollment_id = $1
             ORDER BY seq ASC"
        );
        Ok(sqlx::query_as::<_, AttemptRow>(&query)
            .bind(enrollment_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(QuizAttempt::from)
            .collect())
    }

    async fn quiz_attempts_for_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Vec<QuizAttempt>> {
        let query = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
             WHERE enrollment_id = $1 AND lesson_id = $2
             ORDER BY seq DESC"
        );
        Ok(sqlx::query_as::<_, AttemptRow>(&query)
            .bind(enrollment_id)
            .bind(lesson_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(QuizAttempt::from)
            .collect())
    }

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttempt> {
        let query = format!(
            "INSERT INTO quiz_attempts
                (id, enrollment_id, lesson_id, answers, score, points_earned,
                 points_possible, passed, submitted_at, time_spent_seconds)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0)
             RETURNING {ATTEMPT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AttemptRow>(&query)
            .bind(Uuid::new_v4())
            .bind(attempt.enrollment_id)
            .bind(attempt.lesson_id)
            .bind(Json(attempt.answers))
            .bind(attempt.score)
            .bind(attempt.points_earned)
            .bind(attempt.points_possible)
            .bind(attempt.passed)
            .bind(attempt.submitted_at)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }
}
