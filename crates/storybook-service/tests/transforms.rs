//! Photo transform integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use std::sync::Arc;

use chrono::Utc;

use common::{FakeAutomation, TestHarness};
use storybook_core::{JobId, TransformStatus, Transformation, UserId};
use storybook_service::reconcile::TransformCoordinator;
use storybook_store::{MemoryStore, RecordKey, Store, StoreExt};

fn transform_key(user: &str, job: &str) -> RecordKey {
    RecordKey::transformation(&UserId::new(user).unwrap(), &JobId::new(job).unwrap())
}

async fn send_event(harness: &TestHarness, event: Value) -> axum_test::TestResponse {
    harness
        .post_with_key("/api/photo-transform-webhook", &event)
        .await
}

async fn poll(harness: &TestHarness, user: &str, job: &str) -> Value {
    let response = harness
        .post_with_key(
            "/api/photo-transform-status",
            &json!({ "userId": user, "transformId": job, "templateId": "t1" }),
        )
        .await;
    response.assert_status_ok();
    response.json()
}

async fn begin(harness: &TestHarness, user: &str) -> String {
    let response = harness
        .post_with_key(
            "/v1/transformations",
            &json!({ "userId": user, "templateId": "t1", "photoUrl": "https://img.example/me.jpg" }),
        )
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["transformId"].as_str().unwrap().to_string()
}

fn complete_event(user: &str, job: &str) -> Value {
    json!({
        "type": "complete",
        "data": { "uid": user, "transformId": job, "transformedImageUrl": "https://img.example/out.png" }
    })
}

// ============================================================================
// Job registration
// ============================================================================

#[tokio::test]
async fn begin_registers_and_forwards_job() {
    let harness = TestHarness::new();

    let response = harness
        .post_with_key(
            "/v1/transformations",
            &json!({ "userId": "u1", "templateId": "t1", "photoUrl": "https://img.example/me.jpg" }),
        )
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let job = body["transformId"].as_str().unwrap().to_string();

    let record = harness
        .store
        .get_record::<Transformation>(&transform_key("u1", &job))
        .unwrap()
        .unwrap();
    assert_eq!(record.value.status, TransformStatus::Processing);

    let forwarded = harness.automation.transform_requests();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].transform_id.as_str(), job);
    assert_eq!(forwarded[0].photo_url, "https://img.example/me.jpg");
}

#[tokio::test]
async fn begin_removes_record_when_worker_unreachable() {
    let harness = TestHarness::new();
    harness.automation.fail_all();

    let response = harness
        .post_with_key(
            "/v1/transformations",
            &json!({ "userId": "u1", "templateId": "t1", "photoUrl": "https://img.example/me.jpg" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(harness.memory.is_empty());
}

// ============================================================================
// Lifecycle events and consume-once resolution
// ============================================================================

#[tokio::test]
async fn completed_result_is_consumed_once() {
    let harness = TestHarness::new();
    let job = begin(&harness, "u1").await;

    send_event(&harness, json!({ "type": "start", "data": { "uid": "u1", "transformId": job } }))
        .await
        .assert_status_ok();
    assert_eq!(poll(&harness, "u1", &job).await["status"], "pending");

    let response = send_event(&harness, complete_event("u1", &job)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "completed");

    let first = poll(&harness, "u1", &job).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["status"], "completed");
    assert_eq!(first["transformedImageUrl"], "https://img.example/out.png");
    assert!(harness
        .store
        .get(&transform_key("u1", &job))
        .unwrap()
        .is_none());

    let second = poll(&harness, "u1", &job).await;
    assert_eq!(second["success"], true);
    assert_eq!(second["status"], "pending");
}

#[tokio::test]
async fn redelivered_complete_after_consumption_is_ignored() {
    let harness = TestHarness::new();
    let job = begin(&harness, "u1").await;

    send_event(&harness, complete_event("u1", &job))
        .await
        .assert_status_ok();
    assert_eq!(poll(&harness, "u1", &job).await["status"], "completed");

    let response = send_event(&harness, complete_event("u1", &job)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body.get("status").is_none());

    assert!(harness
        .store
        .get(&transform_key("u1", &job))
        .unwrap()
        .is_none());
    assert_eq!(poll(&harness, "u1", &job).await["status"], "pending");
}

#[tokio::test]
async fn late_start_does_not_reopen_finished_job() {
    let harness = TestHarness::new();
    let job = begin(&harness, "u1").await;

    send_event(&harness, complete_event("u1", &job))
        .await
        .assert_status_ok();
    let response = send_event(
        &harness,
        json!({ "type": "start", "data": { "uid": "u1", "transformId": job } }),
    )
    .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "completed");

    let result = poll(&harness, "u1", &job).await;
    assert_eq!(result["status"], "completed");
    assert_eq!(result["transformedImageUrl"], "https://img.example/out.png");
}

#[tokio::test]
async fn event_for_unregistered_job_creates_nothing() {
    let harness = TestHarness::new();

    for kind in ["start", "error"] {
        send_event(
            &harness,
            json!({ "type": kind, "data": { "uid": "u1", "transformId": "j1" } }),
        )
        .await
        .assert_status_ok();
    }
    send_event(&harness, complete_event("u1", "j1"))
        .await
        .assert_status_ok();

    assert!(harness.memory.is_empty());
    assert_eq!(poll(&harness, "u1", "j1").await["status"], "pending");
}

#[test]
fn concurrent_pollers_see_result_once() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(TransformCoordinator::new(
        Arc::clone(&store),
        Arc::new(FakeAutomation::default()),
    ));

    let mut record = Transformation::started(Utc::now());
    record.mark_completed("https://img.example/out.png", Utc::now());
    store.put_record(&transform_key("u1", "j1"), &record).unwrap();

    let pollers: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                coordinator
                    .resolve(&UserId::new("u1").unwrap(), &JobId::new("j1").unwrap())
                    .unwrap()
            })
        })
        .collect();

    let terminal = pollers
        .into_iter()
        .map(|poller| poller.join().unwrap())
        .filter(|resolution| resolution.is_terminal())
        .count();
    assert_eq!(terminal, 1);
    assert!(store.get(&transform_key("u1", "j1")).unwrap().is_none());
}

#[tokio::test]
async fn error_event_resolves_to_failure() {
    let harness = TestHarness::new();
    let job = begin(&harness, "u1").await;

    send_event(&harness, json!({ "type": "error", "data": { "uid": "u1", "transformId": job } }))
        .await
        .assert_status_ok();

    let body = poll(&harness, "u1", &job).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Unknown error occurred");
}

#[tokio::test]
async fn complete_without_image_is_rejected() {
    let harness = TestHarness::new();

    let response = send_event(
        &harness,
        json!({ "type": "complete", "data": { "uid": "u1", "transformId": "j1" } }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(harness.memory.is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_rejected() {
    let harness = TestHarness::new();

    let response = send_event(
        &harness,
        json!({ "type": "progress", "data": { "uid": "u1", "transformId": "j1" } }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(harness.memory.is_empty());
}

#[tokio::test]
async fn unknown_job_polls_as_pending() {
    let harness = TestHarness::new();

    let body = poll(&harness, "u1", "never-started").await;

    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn poll_requires_ids() {
    let harness = TestHarness::new();

    let response = harness
        .post_with_key("/api/photo-transform-status", &json!({ "userId": "u1" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
