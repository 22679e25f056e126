use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProgressStore, Result, StoreError};
use crate::models::{
    Course, CourseDetail, CourseFilter, Enrollment, EnrollmentStatus, Lesson, LessonProgress, NewQuizAttempt,
    QuizAttempt,
};
use crate::quiz;

/// Catalog fixture for the memory store, e.g. loaded from `COURSEWORK_SEED`.
#[derive(Deserialize, Debug, Default)]
pub struct Seed {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Default)]
struct Tables {
    courses: HashMap<Uuid, Course>,
    lessons: Vec<Lesson>,
    enrollments: Vec<Enrollment>,
    progress: Vec<LessonProgress>,
    attempts: Vec<QuizAttempt>,
}

/// In-process store with the same contract as [`super::PgStore`].
///
/// Courses and lessons have no write path in the service, so they are
/// seeded directly with [`MemoryStore::insert_course`] and
/// [`MemoryStore::insert_lesson`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_course(&self, course: Course) {
        self.tables.write().await.courses.insert(course.id, course);
    }

    /// Fails with [`StoreError::Corrupt`] when the quiz questions are not
    /// gradable, the same check [`super::PgStore`] applies on read.
    pub async fn insert_lesson(&self, lesson: Lesson) -> Result<()> {
        check_lesson(&lesson)?;
        self.tables.write().await.lessons.push(lesson);
        Ok(())
    }

    /// Load a catalog. Nothing is inserted if any lesson is rejected.
    pub async fn seed(&self, seed: Seed) -> Result<()> {
        for lesson in &seed.lessons {
            check_lesson(lesson)?;
        }
        let mut tables = self.tables.write().await;
        for course in seed.courses {
            tables.courses.insert(course.id, course);
        }
        tables.lessons.extend(seed.lessons);
        Ok(())
    }
}

fn check_lesson(lesson: &Lesson) -> Result<()> {
    quiz::validate_questions(&lesson.quiz_questions)
        .map(|_| ())
        .map_err(|e| StoreError::Corrupt {
            entity: "lesson",
            id: lesson.id,
            reason: e.to_string(),
        })
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Ok(self.tables.read().await.courses.get(&course_id).cloned())
    }

    async fn list_published_courses(&self, filter: &CourseFilter) -> Result<Vec<CourseDetail>> {
        let tables = self.tables.read().await;
        let mut courses: Vec<&Course> = tables
            .courses
            .values()
            .filter(|c| c.is_published && filter.matches(c))
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(courses
            .into_iter()
            .skip(usize::try_from(filter.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit()).unwrap_or(usize::MAX))
            .map(|course| CourseDetail {
                course: course.clone(),
                total_lessons: tables
                    .lessons
                    .iter()
                    .filter(|l| l.course_id == course.id)
                    .count(),
            })
            .collect())
    }

    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let tables = self.tables.read().await;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by(|a, b| {
            (a.order, a.created_at, a.id).cmp(&(b.order, b.created_at, b.id))
        });
        Ok(lessons)
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn create_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let mut tables = self.tables.write().await;
        if tables
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.course_id == course_id)
        {
            return Err(StoreError::Duplicate("enrollment"));
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            progress_percentage: 0.0,
            enrolled_at: Utc::now(),
            completed_at: None,
            last_accessed_at: None,
        };
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn enrollments_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(row) = tables.enrollments.iter_mut().find(|e| e.id == enrollment.id) {
            row.progress_percentage = enrollment.progress_percentage;
            row.status = enrollment.status;
            row.completed_at = enrollment.completed_at;
            row.last_accessed_at = enrollment.last_accessed_at;
        }
        Ok(())
    }

    async fn lesson_progress(&self, enrollment_id: Uuid) -> Result<Vec<LessonProgress>> {
        Ok(self
            .tables
            .read()
            .await
            .progress
            .iter()
            .filter(|p| p.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }

    async fn complete_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        let mut tables = self.tables.write().await;
        if let Some(row) = tables
            .progress
            .iter_mut()
            .find(|p| p.enrollment_id == enrollment_id && p.lesson_id == lesson_id)
        {
            row.is_completed = true;
            row.completed_at = Some(now);
            return Ok(row.clone());
        }
        let row = LessonProgress {
            id: Uuid::new_v4(),
            enrollment_id,
            lesson_id,
            is_completed: true,
            started_at: now,
            completed_at: Some(now),
        };
        tables.progress.push(row.clone());
        Ok(row)
    }

    async fn count_completed(&self, enrollment_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        let n = tables
            .progress
            .iter()
            .filter(|p| p.enrollment_id == enrollment_id && p.is_completed)
            .count();
        Ok(n as i64)
    }

    async fn quiz_attempts(&self, enrollment_id: Uuid) -> Result<Vec<QuizAttempt>> {
        Ok(self
            .tables
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }

    async fn quiz_attempts_for_lesson(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Vec<QuizAttempt>> {
        // Insertion order is submission order, so reversing gives newest first
        // even when two attempts share a timestamp.
        Ok(self
            .tables
            .read()
            .await
            .attempts
            .iter()
            .rev()
            .filter(|a| a.enrollment_id == enrollment_id && a.lesson_id == lesson_id)
            .cloned()
            .collect())
    }

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> Result<QuizAttempt> {
        let row = QuizAttempt {
            id: Uuid::new_v4(),
            enrollment_id: attempt.enrollment_id,
            lesson_id: attempt.lesson_id,
            answers: attempt.answers,
            score: attempt.score,
            points_earned: attempt.points_earned,
            points_possible: attempt.points_possible,
            passed: attempt.passed,
            submitted_at: attempt.submitted_at,
            time_spent_seconds: 0,
        };
        self.tables.write().await.attempts.push(row.clone());
        Ok(row)
    }
}
