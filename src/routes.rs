use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    auth::Learner,
    config::Config,
    error::{AppError, AppResult},
    models::*,
    progress::{AccessDecision, ProgressView, QuizResult},
    state::AppState,
    store::StoreError,
};

/// Full application: routes plus the HTTP middleware stack.
pub fn app(state: AppState, config: &Config) -> Router {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(config.max_body_bytes)),
        )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // catalog + enrollment
        .route("/api/courses", get(list_courses))
        .route("/api/courses/:course_id", get(get_course))
        .route("/api/courses/:course_id/lessons", get(list_lessons))
        .route("/api/courses/:course_id/enroll", post(enroll))
        .route("/api/me/enrollments", get(my_enrollments))
        // progress
        .route("/api/courses/:course_id/progress", get(course_progress))
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/can-access",
            get(can_access),
        )
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/complete",
            post(complete_lesson),
        )
        // quizzes
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/quiz/submit",
            post(submit_quiz),
        )
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/quiz/attempts",
            get(quiz_attempts),
        )
        .with_state(state)
}

async fn list_courses(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
) -> AppResult<Json<Vec<CourseDetail>>> {
    Ok(Json(state.store.list_published_courses(&filter).await?))
}

async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CourseDetail>> {
    let course = published_course(&state, course_id).await?;
    let total_lessons = state.store.course_lessons(course_id).await?.len();
    Ok(Json(CourseDetail {
        course,
        total_lessons,
    }))
}

async fn list_lessons(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Vec<LessonSummary>>> {
    published_course(&state, course_id).await?;
    let lessons = state.store.course_lessons(course_id).await?;
    Ok(Json(lessons.iter().map(LessonSummary::from).collect()))
}

async fn enroll(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<EnrollmentResponse>> {
    let course = state
        .store
        .find_course(course_id)
        .await?
        .ok_or(AppError::NotFound("Course"))?;
    if !course.is_published {
        return Err(AppError::Validation(
            "This course is not yet available for enrollment".into(),
        ));
    }

    let enrollment = match state.store.create_enrollment(user_id, course_id).await {
        Ok(e) => e,
        Err(StoreError::Duplicate(_)) => {
            return Err(AppError::Conflict("Already enrolled in this course".into()))
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(%user_id, %course_id, enrollment_id = %enrollment.id, "enrolled");
    Ok(Json(EnrollmentResponse::from(&enrollment)))
}

async fn my_enrollments(
    State(state): State<AppState>,
    Learner(user_id): Learner,
) -> AppResult<Json<Vec<EnrollmentResponse>>> {
    let enrollments = state.store.enrollments_for_user(user_id).await?;
    Ok(Json(enrollments.iter().map(EnrollmentResponse::from).collect()))
}

async fn course_progress(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<ProgressView>> {
    let enrollment = require_enrollment(&state, user_id, course_id).await?;
    Ok(Json(state.engine().progress_view(&enrollment).await?))
}

async fn can_access(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<AccessDecision>> {
    let enrollment = state.store.find_enrollment(user_id, course_id).await?;
    let decision = state
        .engine()
        .can_access(enrollment.as_ref(), course_id, lesson_id)
        .await?;
    Ok(Json(decision))
}

async fn complete_lesson(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<CompletionResponse>> {
    let mut enrollment = require_enrollment(&state, user_id, course_id).await?;
    let progress = state
        .engine()
        .record_completion(&mut enrollment, lesson_id)
        .await?;
    Ok(Json(CompletionResponse {
        message: "Lesson marked as complete".into(),
        progress,
    }))
}

async fn submit_quiz(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(submission): Json<QuizSubmission>,
) -> AppResult<Json<QuizResult>> {
    let mut enrollment = require_enrollment(&state, user_id, course_id).await?;
    let result = state
        .engine()
        .record_quiz_submission(&mut enrollment, lesson_id, &submission.answers)
        .await?;
    Ok(Json(result))
}

async fn quiz_attempts(
    State(state): State<AppState>,
    Learner(user_id): Learner,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<AttemptSummary>>> {
    let enrollment = require_enrollment(&state, user_id, course_id).await?;
    let attempts = state.engine().quiz_attempts(&enrollment, lesson_id).await?;
    Ok(Json(attempts.iter().map(AttemptSummary::from).collect()))
}

// --- helpers ---

/// Drafts are hidden from learners and look like missing courses.
async fn published_course(state: &AppState, course_id: Uuid) -> AppResult<Course> {
    state
        .store
        .find_course(course_id)
        .await?
        .filter(|c| c.is_published)
        .ok_or(AppError::NotFound("Course"))
}

async fn require_enrollment(
    state: &AppState,
    user_id: Uuid,
    course_id: Uuid,
) -> AppResult<Enrollment> {
    state
        .store
        .find_enrollment(user_id, course_id)
        .await?
        .ok_or(AppError::NotEnrolled)
}
