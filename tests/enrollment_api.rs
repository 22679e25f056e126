//! Integration tests for course lookup, lesson listing and enrollment.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{body_json, enrolled_learner, fixture, get, post, send};
use coursework::models::Course;
use serde_json::Value;
use uuid::Uuid;

fn titles(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap().to_string())
        .collect()
}

fn catalog_course(title: &str, age_days: i64, category: &str, difficulty: &str) -> Course {
    Course {
        title: title.into(),
        slug: title.to_lowercase().replace(' ', "-"),
        category: Some(category.into()),
        difficulty_level: difficulty.into(),
        created_at: Utc::now() - Duration::days(age_days),
        ..common::course(true)
    }
}

#[tokio::test]
async fn health_is_ok() {
    let fx = fixture().await;
    let response = send(&fx.app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn course_detail_counts_lessons() {
    let fx = fixture().await;
    let response = get(&fx.app, &format!("/api/courses/{}", fx.course.id), Uuid::new_v4()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Intro to Rust");
    assert_eq!(body["total_lessons"], 3);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let fx = fixture().await;
    let response = get(&fx.app, &format!("/api/courses/{}", Uuid::new_v4()), Uuid::new_v4()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["error"], "Course not found");
}

#[tokio::test]
async fn draft_course_detail_is_not_found() {
    let fx = fixture().await;
    let draft = common::course(false);
    fx.store.insert_course(draft.clone()).await;

    let response = get(&fx.app, &format!("/api/courses/{}", draft.id), Uuid::new_v4()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Course not found");

    let response = get(&fx.app, &format!("/api/courses/{}/lessons", draft.id), Uuid::new_v4()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_lists_published_courses_newest_first() {
    let fx = fixture().await;
    fx.store.insert_course(catalog_course("Old Go", 30, "programming", "advanced")).await;
    fx.store.insert_course(catalog_course("Watercolor", 2, "art", "beginner")).await;
    fx.store.insert_course(common::course(false)).await;

    let response = get(&fx.app, "/api/courses", Uuid::new_v4()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // fixture course is created "now", so it is the newest
    assert_eq!(titles(&body), vec!["Intro to Rust", "Watercolor", "Old Go"]);
    assert_eq!(body[0]["total_lessons"], 3);
    assert_eq!(body[1]["total_lessons"], 0);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["is_published"] == true));
}

#[tokio::test]
async fn catalog_filters_and_pages() {
    let fx = fixture().await;
    fx.store.insert_course(catalog_course("Old Go", 30, "programming", "advanced")).await;
    fx.store.insert_course(catalog_course("Watercolor", 2, "art", "beginner")).await;

    let body = body_json(get(&fx.app, "/api/courses?category=programming", Uuid::new_v4()).await).await;
    assert_eq!(titles(&body), vec!["Intro to Rust", "Old Go"]);

    let body = body_json(get(&fx.app, "/api/courses?difficulty=advanced", Uuid::new_v4()).await).await;
    assert_eq!(titles(&body), vec!["Old Go"]);

    let body = body_json(get(&fx.app, "/api/courses?skip=1&limit=1", Uuid::new_v4()).await).await;
    assert_eq!(titles(&body), vec!["Watercolor"]);

    let body = body_json(get(&fx.app, "/api/courses?skip=5", Uuid::new_v4()).await).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lesson_listing_is_ordered_and_hides_answers() {
    let fx = fixture().await;
    let response = get(
        &fx.app,
        &format!("/api/courses/{}/lessons", fx.course.id),
        Uuid::new_v4(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let lessons = body.as_array().unwrap();
    let orders: Vec<i64> = lessons.iter().map(|l| l["order"].as_i64().unwrap()).collect();
    assert_eq!(orders, vec![1, 2, 3]);

    let question = &lessons[1]["quiz_questions"][0];
    assert_eq!(question["id"], 1);
    assert_eq!(question["points"], 10);
    assert!(question.get("correct_answer").is_none());
    assert_eq!(lessons[1]["quiz_passing_score"], 70);
    assert!(lessons[0]["quiz_passing_score"].is_null());
}

#[tokio::test]
async fn enroll_then_list_enrollments() {
    let fx = fixture().await;
    let user = enrolled_learner(&fx).await;

    let response = get(&fx.app, "/api/me/enrollments", user).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let enrollments = body.as_array().unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0]["course_id"], fx.course.id.to_string());
    assert_eq!(enrollments[0]["status"], "active");
    assert_eq!(enrollments[0]["progress_percentage"], 0.0);
}

#[tokio::test]
async fn enrolling_twice_conflicts() {
    let fx = fixture().await;
    let user = enrolled_learner(&fx).await;
    let response = post(&fx.app, &format!("/api/courses/{}/enroll", fx.course.id), user, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Already enrolled in this course");
}

#[tokio::test]
async fn unpublished_course_rejects_enrollment() {
    let fx = fixture().await;
    let draft = common::course(false);
    fx.store.insert_course(draft.clone()).await;
    let response = post(&fx.app, &format!("/api/courses/{}/enroll", draft.id), Uuid::new_v4(), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_or_bad_user_header_is_unauthorized() {
    let fx = fixture().await;
    let response = send(&fx.app, Method::GET, "/api/me/enrollments", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = axum::http::Request::builder()
        .uri("/api/me/enrollments")
        .header(coursework::auth::USER_ID_HEADER, "not-a-uuid")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(fx.app.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}
