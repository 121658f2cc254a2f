//! Every authenticated endpoint rejects bad credentials before writing.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{with_api_key, TestHarness};

fn authenticated_posts() -> Vec<(&'static str, Value)> {
    vec![
        (
            "/api/photo-transform-webhook",
            json!({ "type": "start", "data": { "uid": "u1", "transformId": "j1" } }),
        ),
        (
            "/api/photo-transform-status",
            json!({ "userId": "u1", "transformId": "j1" }),
        ),
        (
            "/api/story-webhook",
            json!({ "data": { "storyId": "s1", "userId": "u1", "bookDetails": { "title": "X" } } }),
        ),
        (
            "/api/webhook",
            json!({ "action": "create", "data": { "story": { "basicInfo": { "id": "t1", "title": "T" } } } }),
        ),
        (
            "/v1/transformations",
            json!({ "userId": "u1", "templateId": "t1", "photoUrl": "https://img.example/me.jpg" }),
        ),
    ]
}

#[tokio::test]
async fn missing_api_key_is_rejected_without_writes() {
    let harness = TestHarness::new();
    let seeded = harness.seed_pending_story("u1", "s1", "t1");

    for (path, body) in authenticated_posts() {
        let response = harness.server.post(path).json(&body).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Unauthorized - Invalid API Key");
    }

    assert_eq!(harness.memory.len(), 1);
    assert_eq!(harness.story("u1", "s1"), Some(seeded));
    assert!(harness.automation.transform_requests().is_empty());
}

#[tokio::test]
async fn wrong_api_key_is_rejected_without_writes() {
    let harness = TestHarness::new();
    let seeded = harness.seed_pending_story("u1", "s1", "t1");

    for (path, body) in authenticated_posts() {
        with_api_key(harness.server.post(path), "not-the-key")
            .json(&body)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    assert_eq!(harness.memory.len(), 1);
    assert_eq!(harness.story("u1", "s1"), Some(seeded));
}

#[tokio::test]
async fn unconfigured_key_rejects_everything() {
    let mut config = common::test_config();
    config.automation_api_key = None;
    let harness = TestHarness::with_config(config);

    for (path, body) in authenticated_posts() {
        with_api_key(harness.server.post(path), "")
            .json(&body)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
    assert!(harness.memory.is_empty());
}

#[tokio::test]
async fn user_reads_require_api_key() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");

    for path in [
        "/v1/users/u1/stories",
        "/v1/users/u1/stories/s1",
        "/v1/users/u1/stories/events",
    ] {
        harness
            .server
            .get(path)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn webhooks_only_accept_post() {
    let harness = TestHarness::new();

    for (path, _) in authenticated_posts().into_iter().filter(|(p, _)| p.starts_with("/api")) {
        harness
            .server
            .get(path)
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
    harness
        .server
        .get("/api/payment-webhook")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
