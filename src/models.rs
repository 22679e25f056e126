use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::quiz::QuizQuestion;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Text,
    Quiz,
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ContentType::Video),
            "text" => Ok(ContentType::Text),
            "quiz" => Ok(ContentType::Quiz),
            other => Err(format!("unknown content type '{other}'")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            other => Err(format!("unknown enrollment status '{other}'")),
        }
    }
}

pub const DEFAULT_DIFFICULTY: &str = "beginner";

fn default_difficulty() -> String {
    DEFAULT_DIFFICULTY.to_string()
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string of the course catalog listing.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CourseFilter {
    #[serde(default)]
    pub skip: u32,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

impl CourseFilter {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    /// Category and difficulty match; publication is checked separately.
    pub fn matches(&self, course: &Course) -> bool {
        self.category
            .as_deref()
            .map_or(true, |c| course.category.as_deref() == Some(c))
            && self
                .difficulty
                .as_deref()
                .map_or(true, |d| course.difficulty_level == d)
    }
}

pub const DEFAULT_PASSING_SCORE: i32 = 70;

fn default_passing_score() -> i32 {
    DEFAULT_PASSING_SCORE
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    pub order: i32,
    #[serde(default = "default_passing_score")]
    pub quiz_passing_score: i32,
    #[serde(default)]
    pub quiz_questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    pub fn is_quiz(&self) -> bool {
        self.content_type == ContentType::Quiz
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress_percentage: f64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct LessonProgress {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub answers: BTreeMap<i64, usize>,
    pub score: f64,
    pub points_earned: i32,
    pub points_possible: i32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub time_spent_seconds: i32,
}

/// Attempt fields computed by scoring, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub answers: BTreeMap<i64, usize>,
    pub score: f64,
    pub points_earned: i32,
    pub points_possible: i32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

// --- request / response bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuizSubmission {
    pub answers: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub total_lessons: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress_percentage: f64,
    pub enrolled_at: DateTime<Utc>,
}

impl From<&Enrollment> for EnrollmentResponse {
    fn from(e: &Enrollment) -> Self {
        Self {
            id: e.id,
            course_id: e.course_id,
            status: e.status,
            progress_percentage: e.progress_percentage,
            enrolled_at: e.enrolled_at,
        }
    }
}

/// Question as shown to a learner: no correct answer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub points: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LessonSummary {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    pub order: i32,
    pub quiz_passing_score: Option<i32>,
    pub quiz_questions: Vec<PublicQuestion>,
}

impl From<&Lesson> for LessonSummary {
    fn from(l: &Lesson) -> Self {
        let quiz_questions = l
            .quiz_questions
            .iter()
            .map(|q| PublicQuestion {
                id: q.id,
                question: q.question.clone(),
                options: q.options.clone(),
                points: q.points,
            })
            .collect();
        Self {
            id: l.id,
            course_id: l.course_id,
            title: l.title.clone(),
            content_type: l.content_type,
            order: l.order,
            quiz_passing_score: l.is_quiz().then_some(l.quiz_passing_score),
            quiz_questions,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub message: String,
    pub progress: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub score: f64,
    pub points_earned: i32,
    pub points_possible: i32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

impl From<&QuizAttempt> for AttemptSummary {
    fn from(a: &QuizAttempt) -> Self {
        Self {
            id: a.id,
            score: a.score,
            points_earned: a.points_earned,
            points_possible: a.points_possible,
            passed: a.passed,
            submitted_at: a.submitted_at,
        }
    }
}
