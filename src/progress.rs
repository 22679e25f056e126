//! Lesson progress and sequential access control.
//!
//! A lesson is unlocked when it is the first lesson of its course or when the
//! lesson right before it is effectively complete. "Effectively complete"
//! means passed for quizzes and marked complete for everything else; see
//! [`is_lesson_effectively_complete`], which both the progress view and the
//! access check go through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::models::{
    ContentType, Enrollment, EnrollmentStatus, Lesson, LessonProgress, NewQuizAttempt,
    QuizAttempt,
};
use crate::quiz::{self, QuizError};
use crate::store::{ProgressStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("lesson not found in course")]
    LessonNotFound,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ProgressError>;

/// Best-scoring attempt for one quiz lesson.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestAttempt {
    pub score: f64,
    pub passed: bool,
    /// Whether any attempt, not only the best one, passed.
    pub ever_passed: bool,
}

/// Fold attempts (in submission order) into one summary per lesson.
///
/// A later attempt replaces the current best only on a strictly greater
/// score, so the earliest of equally scored attempts is kept.
pub fn best_attempts(attempts: &[QuizAttempt]) -> HashMap<Uuid, BestAttempt> {
    let mut best: HashMap<Uuid, BestAttempt> = HashMap::new();
    for attempt in attempts {
        best.entry(attempt.lesson_id)
            .and_modify(|b| {
                b.ever_passed |= attempt.passed;
                if attempt.score > b.score {
                    b.score = attempt.score;
                    b.passed = attempt.passed;
                }
            })
            .or_insert(BestAttempt {
                score: attempt.score,
                passed: attempt.passed,
                ever_passed: attempt.passed,
            });
    }
    best
}

pub fn is_lesson_effectively_complete(
    lesson: &Lesson,
    progress: Option<&LessonProgress>,
    best_quiz: Option<&BestAttempt>,
) -> bool {
    if lesson.is_quiz() {
        best_quiz.is_some_and(|b| b.ever_passed)
    } else {
        progress.is_some_and(|p| p.is_completed)
    }
}

/// Per-lesson row of the progress view.
///
/// Optional fields serialize as explicit `null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonStatus {
    pub lesson_id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    pub order: i32,
    pub is_completed: bool,
    pub is_unlocked: bool,
    pub quiz_passed: Option<bool>,
    pub best_score: Option<f64>,
    pub passing_score: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub overall_progress: f64,
    pub status: EnrollmentStatus,
    pub lessons: Vec<LessonStatus>,
}

/// Build the ordered view. `lessons` must already be in course order.
pub fn compute_progress_view(
    enrollment: &Enrollment,
    lessons: &[Lesson],
    progress: &[LessonProgress],
    attempts: &[QuizAttempt],
) -> ProgressView {
    let progress_map: HashMap<Uuid, &LessonProgress> =
        progress.iter().map(|p| (p.lesson_id, p)).collect();
    let best = best_attempts(attempts);

    let mut previous_completed = true;
    let mut rows = Vec::with_capacity(lessons.len());
    for (idx, lesson) in lessons.iter().enumerate() {
        let record = progress_map.get(&lesson.id).copied();
        let quiz_info = if lesson.is_quiz() {
            best.get(&lesson.id)
        } else {
            None
        };
        let is_completed = is_lesson_effectively_complete(lesson, record, quiz_info);

        rows.push(LessonStatus {
            lesson_id: lesson.id,
            title: lesson.title.clone(),
            content_type: lesson.content_type,
            order: lesson.order,
            is_completed,
            is_unlocked: idx == 0 || previous_completed,
            quiz_passed: quiz_info.map(|b| b.passed),
            best_score: quiz_info.map(|b| b.score),
            passing_score: lesson.is_quiz().then_some(lesson.quiz_passing_score),
            completed_at: record.and_then(|p| p.completed_at),
        });

        previous_completed = is_completed;
    }

    ProgressView {
        enrollment_id: enrollment.id,
        course_id: enrollment.course_id,
        overall_progress: enrollment.progress_percentage,
        status: enrollment.status,
        lessons: rows,
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub can_access: bool,
    pub reason: String,
    pub blocking_lesson_id: Option<Uuid>,
    pub blocking_lesson_title: Option<String>,
}

impl AccessDecision {
    fn granted(reason: &str) -> Self {
        Self {
            can_access: true,
            reason: reason.to_string(),
            blocking_lesson_id: None,
            blocking_lesson_title: None,
        }
    }

    fn denied(reason: &str) -> Self {
        Self {
            can_access: false,
            reason: reason.to_string(),
            blocking_lesson_id: None,
            blocking_lesson_title: None,
        }
    }

    fn blocked_by(lesson: &Lesson) -> Self {
        let reason = if lesson.is_quiz() {
            format!(
                "You must pass the quiz '{}' with at least {}% before proceeding",
                lesson.title, lesson.quiz_passing_score
            )
        } else {
            format!("You must complete '{}' before proceeding", lesson.title)
        };
        Self {
            can_access: false,
            reason,
            blocking_lesson_id: Some(lesson.id),
            blocking_lesson_title: Some(lesson.title.clone()),
        }
    }
}

/// Decide whether `target` may be opened now.
///
/// Prerequisites are scanned in course order and the first unmet one is
/// reported.
pub fn can_access_lesson(
    enrollment: Option<&Enrollment>,
    lessons: &[Lesson],
    progress: &[LessonProgress],
    attempts: &[QuizAttempt],
    target: Uuid,
) -> AccessDecision {
    if enrollment.is_none() {
        return AccessDecision::denied("Not enrolled in this course");
    }
    let Some(target_index) = lessons.iter().position(|l| l.id == target) else {
        return AccessDecision::denied("Lesson not found");
    };
    if target_index == 0 {
        return AccessDecision::granted("First lesson");
    }

    let progress_map: HashMap<Uuid, &LessonProgress> =
        progress.iter().map(|p| (p.lesson_id, p)).collect();
    let best = best_attempts(attempts);

    for prev in &lessons[..target_index] {
        let complete = is_lesson_effectively_complete(
            prev,
            progress_map.get(&prev.id).copied(),
            best.get(&prev.id),
        );
        if !complete {
            return AccessDecision::blocked_by(prev);
        }
    }

    AccessDecision::granted("All prerequisites completed")
}

/// Completed rows over total lessons, as a percentage in `[0, 100]`.
pub fn completion_percentage(completed: i64, total_lessons: usize) -> f64 {
    if total_lessons == 0 {
        return 0.0;
    }
    (completed as f64 / total_lessons as f64 * 100.0).clamp(0.0, 100.0)
}

/// Write a freshly recomputed percentage into the enrollment.
pub fn apply_percentage(enrollment: &mut Enrollment, percentage: f64, now: DateTime<Utc>) {
    enrollment.progress_percentage = percentage;
    enrollment.last_accessed_at = Some(now);
    if percentage >= 100.0 {
        enrollment.status = EnrollmentStatus::Completed;
        enrollment.completed_at = Some(now);
    } else {
        enrollment.status = EnrollmentStatus::Active;
        enrollment.completed_at = None;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub score: f64,
    pub points_earned: i32,
    pub points_possible: i32,
    pub passed: bool,
    pub correct_answers: BTreeMap<String, usize>,
    /// Quiz duration is not tracked; always 0.
    pub time_spent_seconds: i32,
}

/// Store-backed operations over the pure rules above.
pub struct ProgressEngine<'a> {
    store: &'a dyn ProgressStore,
}

impl<'a> ProgressEngine<'a> {
    pub fn new(store: &'a dyn ProgressStore) -> Self {
        Self { store }
    }

    pub async fn progress_view(&self, enrollment: &Enrollment) -> Result<ProgressView> {
        let lessons = self.store.course_lessons(enrollment.course_id).await?;
        let progress = self.store.lesson_progress(enrollment.id).await?;
        let attempts = self.store.quiz_attempts(enrollment.id).await?;
        Ok(compute_progress_view(enrollment, &lessons, &progress, &attempts))
    }

    pub async fn can_access(
        &self,
        enrollment: Option<&Enrollment>,
        course_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<AccessDecision> {
        let Some(enrollment) = enrollment else {
            return Ok(can_access_lesson(None, &[], &[], &[], lesson_id));
        };
        let lessons = self.store.course_lessons(course_id).await?;
        let progress = self.store.lesson_progress(enrollment.id).await?;
        let attempts = self.store.quiz_attempts(enrollment.id).await?;
        let decision = can_access_lesson(Some(enrollment), &lessons, &progress, &attempts, lesson_id);
        if !decision.can_access {
            tracing::debug!(
                enrollment_id = %enrollment.id,
                %lesson_id,
                blocking = ?decision.blocking_lesson_id,
                "lesson access denied"
            );
        }
        Ok(decision)
    }

    /// Mark a lesson complete and recompute the enrollment's percentage.
    ///
    /// Quiz lessons are not marked here; they complete only by being passed.
    pub async fn record_completion(
        &self,
        enrollment: &mut Enrollment,
        lesson_id: Uuid,
    ) -> Result<f64> {
        let lessons = self.store.course_lessons(enrollment.course_id).await?;
        let lesson = find_lesson(&lessons, lesson_id)?;
        let now = Utc::now();

        if !lesson.is_quiz() {
            self.store.complete_lesson(enrollment.id, lesson.id, now).await?;
        }
        self.recompute(enrollment, lessons.len(), now).await?;

        tracing::info!(
            enrollment_id = %enrollment.id,
            %lesson_id,
            progress = enrollment.progress_percentage,
            "lesson completed"
        );
        Ok(enrollment.progress_percentage)
    }

    /// Grade a submission, append the attempt, and on a pass complete the lesson.
    pub async fn record_quiz_submission(
        &self,
        enrollment: &mut Enrollment,
        lesson_id: Uuid,
        raw_answers: &BTreeMap<String, serde_json::Value>,
    ) -> Result<QuizResult> {
        let lessons = self.store.course_lessons(enrollment.course_id).await?;
        let lesson = find_lesson(&lessons, lesson_id)?;
        quiz::ensure_gradable(lesson)?;

        let answers = quiz::parse_answers(&lesson.quiz_questions, raw_answers)?;
        let graded = quiz::grade(&lesson.quiz_questions, &answers, lesson.quiz_passing_score)?;
        let now = Utc::now();

        self.store
            .insert_quiz_attempt(NewQuizAttempt {
                enrollment_id: enrollment.id,
                lesson_id: lesson.id,
                answers,
                score: graded.score,
                points_earned: graded.points_earned,
                points_possible: graded.points_possible,
                passed: graded.passed,
                submitted_at: now,
            })
            .await?;

        if graded.passed {
            self.store.complete_lesson(enrollment.id, lesson.id, now).await?;
            self.recompute(enrollment, lessons.len(), now).await?;
        }

        tracing::info!(
            enrollment_id = %enrollment.id,
            %lesson_id,
            score = graded.score,
            passed = graded.passed,
            "quiz submitted"
        );

        Ok(QuizResult {
            score: quiz::round1(graded.score),
            points_earned: graded.points_earned,
            points_possible: graded.points_possible,
            passed: graded.passed,
            correct_answers: graded.correct_answers,
            time_spent_seconds: 0,
        })
    }

    /// Attempts for one lesson of the enrollment's course, newest first.
    pub async fn quiz_attempts(
        &self,
        enrollment: &Enrollment,
        lesson_id: Uuid,
    ) -> Result<Vec<QuizAttempt>> {
        let lessons = self.store.course_lessons(enrollment.course_id).await?;
        find_lesson(&lessons, lesson_id)?;
        Ok(self
            .store
            .quiz_attempts_for_lesson(enrollment.id, lesson_id)
            .await?)
    }

    async fn recompute(
        &self,
        enrollment: &mut Enrollment,
        total_lessons: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let completed = self.store.count_completed(enrollment.id).await?;
        apply_percentage(enrollment, completion_percentage(completed, total_lessons), now);
        self.store.save_enrollment_progress(enrollment).await?;
        Ok(())
    }
}

fn find_lesson(lessons: &[Lesson], lesson_id: Uuid) -> Result<&Lesson> {
    lessons
        .iter()
        .find(|l| l.id == lesson_id)
        .ok_or(ProgressError::LessonNotFound)
}
