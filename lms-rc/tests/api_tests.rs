//! Integration tests for lms-rc API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Bearer token authentication on the trigger
//! - Trigger response bodies for success, run-level failure and overlap

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
};
use chrono::{Duration, Utc};
use lms_common::api::issue_token;
use lms_common::db::init_memory_database;
use lms_common::db::training::{find_progress, insert_progress_if_absent};
use lms_common::db::{ProgressFilter, TrainingProgressRecord};
use lms_common::{Category, TrainingKey};
use lms_rc::reclassify::MigrationPlan;
use lms_rc::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

const SECRET: &str = "test-secret";

/// Test helper: in-memory database with one record to migrate
async fn setup_test_db() -> SqlitePool {
    let pool = init_memory_database().await.expect("Should open test database");
    let record = TrainingProgressRecord::new(
        "u1",
        TrainingKey::Name("Foundation of Service".to_string()),
        Category::Assigned,
    )
    .completed(Some(95.0), Utc::now());
    insert_progress_if_absent(&pool, &record).await.unwrap();
    pool
}

/// Test helper: app with the default plan
fn setup_app(db: SqlitePool, api_secret: Option<&str>) -> (axum::Router, AppState) {
    let state = AppState::new(
        db,
        api_secret.map(str::to_string),
        vec![MigrationPlan::default_plan()],
    );
    (build_router(state.clone()), state)
}

fn trigger_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/reclassify");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn bearer(secret: &str, ttl: Duration) -> String {
    format!("Bearer {}", issue_token("admin-1", Some("admin"), secret, ttl).unwrap())
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _) = setup_app(setup_test_db().await, Some(SECRET));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lms-rc");
    assert!(body["version"].is_string());
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_trigger_without_token_rejected() {
    let db = setup_test_db().await;
    let (app, _) = setup_app(db.clone(), Some(SECRET));

    let response = app.oneshot(trigger_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert!(body["message"].as_str().unwrap().contains("Missing bearer token"));

    // Nothing migrated
    let rows = find_progress(&db, &ProgressFilter::new()).await.unwrap();
    assert_eq!(rows[0].category, Category::Assigned);
}

#[tokio::test]
async fn test_trigger_with_bad_tokens_rejected() {
    let (app, _) = setup_app(setup_test_db().await, Some(SECRET));

    for authorization in [
        bearer("other-secret", Duration::minutes(5)),
        bearer(SECRET, Duration::minutes(-5)),
        "Basic YWRtaW46YWRtaW4=".to_string(),
    ] {
        let response = app
            .clone()
            .oneshot(trigger_request(Some(&authorization)))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "accepted {}",
            authorization
        );
        let body = extract_json(response.into_body()).await;
        assert!(body["message"].is_string());
    }
}

// =============================================================================
// Trigger Tests
// =============================================================================

#[tokio::test]
async fn test_trigger_with_valid_token_migrates() {
    let db = setup_test_db().await;
    let (app, _) = setup_app(db.clone(), Some(SECRET));

    let authorization = bearer(SECRET, Duration::minutes(5));
    let response = app
        .oneshot(trigger_request(Some(&authorization)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["message"].as_str().unwrap().contains("1 record(s) moved"));
    assert_eq!(body["reports"][0]["training_name"], "Foundation of Service");
    assert_eq!(body["reports"][0]["moved"], 1);
    assert_eq!(body["reports"][0]["skipped"], 0);

    let rows = find_progress(&db, &ProgressFilter::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, Category::Mandatory);
}

#[tokio::test]
async fn test_trigger_open_when_no_secret() {
    let (app, _) = setup_app(setup_test_db().await, None);

    let response = app.oneshot(trigger_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trigger_reports_run_level_failure() {
    let db = setup_test_db().await;
    let (app, _) = setup_app(db.clone(), None);
    db.close().await;

    let response = app.oneshot(trigger_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Storage unavailable"));
}

#[tokio::test]
async fn test_overlapping_trigger_conflicts() {
    let (app, state) = setup_app(setup_test_db().await, None);
    let _running = state.run_lock.lock().await;

    let response = app.oneshot(trigger_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert!(body["message"].as_str().unwrap().contains("already running"));
}
