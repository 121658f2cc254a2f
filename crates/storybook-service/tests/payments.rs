//! Payment webhook integration tests.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Value};

use common::{completed_event, session_event, TestHarness};
use storybook_core::{ChildGender, PaymentStatus};
use storybook_service::crypto::sign_stripe_payload;

// ============================================================================
// checkout.session.completed
// ============================================================================

#[tokio::test]
async fn completed_marks_story_paid_and_triggers_generation() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/api/create-checkout-session")
        .json(&json!({
            "storyId": "s1",
            "userId": "u1",
            "userEmail": "parent@example.com",
            "templateId": "t1",
            "childName": "Mia",
            "childAge": "5",
            "childGender": "female",
            "transformedPhotoUrl": "https://img.example/mia.png"
        }))
        .await
        .assert_status_ok();

    let response = harness
        .signed_payment_webhook(&completed_event("evt_1", "u1", "s1", "t1"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    let story = harness.story("u1", "s1").unwrap();
    assert_eq!(story.payment_status, PaymentStatus::Completed);
    assert_eq!(story.session_id.as_deref(), Some("cs_test_1"));
    let details = story.payment_details.unwrap();
    assert_eq!(details.amount, 1999);
    assert_eq!(details.currency, "usd");
    assert_eq!(details.payment_reference, "pi_test_1");
    assert_eq!(details.payer_email.as_deref(), Some("parent@example.com"));
    assert_eq!(details.paid_at.timestamp(), 1_767_225_600);

    let generations = harness.automation.generations.lock().unwrap().clone();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].story_id.as_str(), "s1");
    assert_eq!(generations[0].template_id.as_str(), "t1");
    assert_eq!(generations[0].session_id, "cs_test_1");
    assert_eq!(generations[0].user_email, "parent@example.com");
    let child = &generations[0].personalization;
    assert_eq!(child.child_name, "Mia");
    assert_eq!(child.child_age, "5");
    assert_eq!(child.child_gender, ChildGender::Female);
    assert_eq!(child.transformed_photo_url, "https://img.example/mia.png");
}

#[tokio::test]
async fn redelivered_confirmation_is_idempotent() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");
    let event = completed_event("evt_1", "u1", "s1", "t1");

    harness.signed_payment_webhook(&event).await.assert_status_ok();
    let mut once = harness.story("u1", "s1").unwrap();

    let response = harness.signed_payment_webhook(&event).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Payment already confirmed");

    let twice = harness.story("u1", "s1").unwrap();
    once.updated_at = twice.updated_at;
    assert_eq!(once, twice);
    assert_eq!(harness.automation.generation_count(), 1);
}

#[tokio::test]
async fn trigger_failure_does_not_fail_the_webhook() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");
    harness.automation.fail_all();

    let response = harness
        .signed_payment_webhook(&completed_event("evt_1", "u1", "s1", "t1"))
        .await;

    response.assert_status_ok();
    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Completed
    );
}

#[tokio::test]
async fn completed_for_unknown_story_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .signed_payment_webhook(&completed_event("evt_1", "u1", "missing", "t1"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(harness.memory.is_empty());
    assert_eq!(harness.automation.generation_count(), 0);
}

#[tokio::test]
async fn completed_without_correlation_is_rejected() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");

    let event = session_event(
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "metadata": { "userId": "u1" } }),
    );
    let response = harness.signed_payment_webhook(&event).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn correlation_falls_back_to_embedded_payment_intent() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");

    let event = session_event(
        "checkout.session.completed",
        json!({
            "id": "cs_test_1",
            "amount_total": 1999,
            "currency": "usd",
            "payment_intent": {
                "id": "pi_embedded",
                "metadata": { "storyId": "s1", "userId": "u1", "templateId": "t1" }
            }
        }),
    );
    harness.signed_payment_webhook(&event).await.assert_status_ok();

    let story = harness.story("u1", "s1").unwrap();
    assert_eq!(story.payment_status, PaymentStatus::Completed);
    assert_eq!(story.payment_details.unwrap().payment_reference, "pi_embedded");
}

#[tokio::test]
async fn correlation_falls_back_to_payment_intent_lookup() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");
    harness
        .provider
        .add_payment_intent("pi_lookup", json!({ "storyId": "s1", "userId": "u1" }));

    let event = session_event(
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "payment_intent": "pi_lookup" }),
    );
    harness.signed_payment_webhook(&event).await.assert_status_ok();

    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Completed
    );
    let generations = harness.automation.generations.lock().unwrap().clone();
    assert_eq!(generations[0].template_id.as_str(), "t1");
}

// ============================================================================
// checkout.session.expired
// ============================================================================

fn expired_event(user: &str, story: &str) -> Value {
    session_event(
        "checkout.session.expired",
        json!({ "id": "cs_test_1", "metadata": { "storyId": story, "userId": user } }),
    )
}

#[tokio::test]
async fn expiry_removes_pending_story() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");

    let response = harness.signed_payment_webhook(&expired_event("u1", "s1")).await;

    response.assert_status_ok();
    assert!(harness.story("u1", "s1").is_none());
}

#[tokio::test]
async fn expiry_after_payment_keeps_the_paid_story() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");
    harness
        .signed_payment_webhook(&completed_event("evt_1", "u1", "s1", "t1"))
        .await
        .assert_status_ok();

    let response = harness.signed_payment_webhook(&expired_event("u1", "s1")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Checkout expiry ignored for paid story");
    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Completed
    );
}

#[tokio::test]
async fn expiry_for_absent_story_is_acknowledged() {
    let harness = TestHarness::new();

    let response = harness.signed_payment_webhook(&expired_event("u1", "gone")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Checkout expired; no pending story");
}

// ============================================================================
// checkout.session.async_payment_failed and other kinds
// ============================================================================

#[tokio::test]
async fn async_payment_failure_is_recorded() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");

    let event = session_event(
        "checkout.session.async_payment_failed",
        json!({ "id": "cs_test_1", "metadata": { "storyId": "s1", "userId": "u1" } }),
    );
    harness.signed_payment_webhook(&event).await.assert_status_ok();

    let story = harness.story("u1", "s1").unwrap();
    assert_eq!(story.payment_status, PaymentStatus::Failed);
    assert!(story.payment_error.is_some());
}

#[tokio::test]
async fn unhandled_event_kinds_are_acknowledged() {
    let harness = TestHarness::new();

    let event = session_event("invoice.paid", json!({ "id": "in_1" }));
    let response = harness.signed_payment_webhook(&event).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Event ignored");
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn wrong_signature_is_rejected_before_any_write() {
    let harness = TestHarness::new();
    harness.seed_pending_story("u1", "s1", "t1");
    let payload = completed_event("evt_1", "u1", "s1", "t1").to_string();
    let signature = sign_stripe_payload(&payload, "whsec_wrong", chrono::Utc::now().timestamp());

    let response = harness
        .server
        .post("/api/payment-webhook")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .text(payload)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Invalid webhook signature");
    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Pending
    );
    assert_eq!(harness.automation.generation_count(), 0);
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/payment-webhook")
        .text(completed_event("evt_1", "u1", "s1", "t1").to_string())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Missing Stripe signature");
}

#[tokio::test]
async fn unconfigured_secret_rejects_every_delivery() {
    let mut config = common::test_config();
    config.stripe_webhook_secret = None;
    let harness = TestHarness::with_config(config);
    harness.seed_pending_story("u1", "s1", "t1");

    let response = harness
        .signed_payment_webhook(&completed_event("evt_1", "u1", "s1", "t1"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        harness.story("u1", "s1").unwrap().payment_status,
        PaymentStatus::Pending
    );
}
