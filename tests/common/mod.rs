#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use coursework::auth::USER_ID_HEADER;
use coursework::config::{Config, StoreKind};
use coursework::models::{ContentType, Course, Lesson, DEFAULT_PASSING_SCORE};
use coursework::quiz::QuizQuestion;
use coursework::routes;
use coursework::state::AppState;
use coursework::store::MemoryStore;

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        db_max_connections: 1,
        max_body_bytes: 64 * 1024,
        cors_origins: Vec::new(),
        store: StoreKind::Memory,
        seed_file: None,
    }
}

/// The three-lesson course used across tests: video, quiz, video.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub app: Router,
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

impl Fixture {
    pub fn l(&self, idx: usize) -> Uuid {
        self.lessons[idx].id
    }
}

pub fn course(published: bool) -> Course {
    Course {
        id: Uuid::new_v4(),
        title: "Intro to Rust".into(),
        slug: "intro-to-rust".into(),
        description: None,
        category: Some("programming".into()),
        difficulty_level: "beginner".into(),
        is_published: published,
        created_at: Utc::now(),
    }
}

pub fn lesson(course_id: Uuid, order: i32, title: &str, content_type: ContentType) -> Lesson {
    Lesson {
        id: Uuid::new_v4(),
        course_id,
        title: title.into(),
        content_type,
        order,
        quiz_passing_score: DEFAULT_PASSING_SCORE,
        quiz_questions: Vec::new(),
        // distinct creation times keep equal-order ties deterministic
        created_at: Utc::now() + Duration::milliseconds(order as i64),
    }
}

pub fn single_question_quiz(course_id: Uuid, order: i32, title: &str) -> Lesson {
    Lesson {
        quiz_questions: vec![QuizQuestion {
            id: 1,
            question: "Which keyword declares an immutable binding?".into(),
            options: vec!["var".into(), "let".into(), "mut".into()],
            correct_answer: 1,
            points: 10,
        }],
        ..lesson(course_id, order, title, ContentType::Quiz)
    }
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let course = course(true);
    let lessons = vec![
        lesson(course.id, 1, "Getting started", ContentType::Video),
        single_question_quiz(course.id, 2, "Bindings quiz"),
        lesson(course.id, 3, "Ownership", ContentType::Video),
    ];
    store.insert_course(course.clone()).await;
    for l in &lessons {
        store.insert_lesson(l.clone()).await.unwrap();
    }
    let app = routes::app(AppState::new(store.clone()), &test_config());
    Fixture {
        store,
        app,
        course,
        lessons,
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, user: Uuid) -> Response<Body> {
    send(app, Method::GET, uri, Some(user), None).await
}

pub async fn post(
    app: &Router,
    uri: &str,
    user: Uuid,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(user), body).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Enroll a fresh learner in the fixture course and return their id.
pub async fn enrolled_learner(fx: &Fixture) -> Uuid {
    let user = Uuid::new_v4();
    let response = post(&fx.app, &format!("/api/courses/{}/enroll", fx.course.id), user, None).await;
    assert_eq!(response.status(), 200);
    user
}
