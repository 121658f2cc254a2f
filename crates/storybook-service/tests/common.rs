//! Common test utilities for storybook integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use storybook_core::{StoryId, TemplateId, UserId, UserStory};
use storybook_service::automation::{PhotoTransformRequest, StoryGenerationRequest};
use storybook_service::crypto::sign_stripe_payload;
use storybook_service::stripe::{CheckoutSession, CheckoutSessionRequest, PaymentIntent};
use storybook_service::{
    create_router, AppState, AutomationError, AutomationPlatform, PaymentProvider,
    ServiceConfig, StripeError,
};
use storybook_store::{MemoryStore, RecordKey, Store, StoreExt};

pub const API_KEY: &str = "test-automation-key";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const PRICE_ID: &str = "price_test_story";
pub const APP_URL: &str = "https://app.example.com";

// ============================================================================
// Fake payment provider
// ============================================================================

/// In-process `PaymentProvider` that records checkout requests.
#[derive(Default)]
pub struct FakeProvider {
    pub sessions: Mutex<Vec<CheckoutSessionRequest>>,
    pub payment_intents: Mutex<HashMap<String, Value>>,
    pub fail_checkout: AtomicBool,
}

impl FakeProvider {
    pub fn fail_next_checkouts(&self) {
        self.fail_checkout.store(true, Ordering::SeqCst);
    }

    pub fn add_payment_intent(&self, id: &str, metadata: Value) {
        self.payment_intents
            .lock()
            .unwrap()
            .insert(id.to_string(), json!({ "id": id, "metadata": metadata }));
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.sessions.lock().unwrap().push(request.clone());
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(StripeError::Api {
                error_type: "invalid_request_error".into(),
                message: "No such price".into(),
                code: Some("resource_missing".into()),
            });
        }

        let n = self.sessions.lock().unwrap().len();
        Ok(serde_json::from_value(json!({
            "id": format!("cs_test_{n}"),
            "url": format!("https://checkout.stripe.test/c/pay/cs_test_{n}"),
        }))
        .unwrap())
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, StripeError> {
        let intent = self
            .payment_intents
            .lock()
            .unwrap()
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                error_type: "invalid_request_error".into(),
                message: format!("No such payment_intent: {payment_intent_id}"),
                code: Some("resource_missing".into()),
            })?;
        Ok(serde_json::from_value(intent).unwrap())
    }
}

// ============================================================================
// Fake automation platform
// ============================================================================

/// In-process `AutomationPlatform` that records every job it is handed.
#[derive(Default)]
pub struct FakeAutomation {
    pub generations: Mutex<Vec<StoryGenerationRequest>>,
    pub transforms: Mutex<Vec<PhotoTransformRequest>>,
    pub fail: AtomicBool,
}

impl FakeAutomation {
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn generation_count(&self) -> usize {
        self.generations.lock().unwrap().len()
    }

    pub fn transform_requests(&self) -> Vec<PhotoTransformRequest> {
        self.transforms.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), AutomationError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AutomationError::Status {
                status: 500,
                body: "scenario crashed".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AutomationPlatform for FakeAutomation {
    async fn trigger_story_generation(
        &self,
        request: &StoryGenerationRequest,
    ) -> Result<(), AutomationError> {
        self.generations.lock().unwrap().push(request.clone());
        self.outcome()
    }

    async fn request_photo_transform(
        &self,
        request: &PhotoTransformRequest,
    ) -> Result<(), AutomationError> {
        self.transforms.lock().unwrap().push(request.clone());
        self.outcome()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server.
    pub store: Arc<dyn Store>,
    /// Same store, concrete, for record counts.
    pub memory: Arc<MemoryStore>,
    /// Payment provider double.
    pub provider: Arc<FakeProvider>,
    /// Automation platform double.
    pub automation: Arc<FakeAutomation>,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = Arc::clone(&memory) as Arc<dyn Store>;
        let provider = Arc::new(FakeProvider::default());
        let automation = Arc::new(FakeAutomation::default());

        let state = AppState::with_collaborators(
            Arc::clone(&store),
            config,
            Some(Arc::clone(&provider) as Arc<dyn PaymentProvider>),
            Arc::clone(&automation) as Arc<dyn AutomationPlatform>,
        );
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            memory,
            provider,
            automation,
        }
    }

    /// POST a JSON body with the shared API key.
    pub fn post_with_key(&self, path: &str, body: &Value) -> TestRequest {
        with_api_key(self.server.post(path), API_KEY).json(body)
    }

    /// GET with the shared API key.
    pub fn get_with_key(&self, path: &str) -> TestRequest {
        with_api_key(self.server.get(path), API_KEY)
    }

    /// POST a payment event signed with the configured secret.
    pub fn signed_payment_webhook(&self, event: &Value) -> TestRequest {
        let payload = event.to_string();
        let signature = sign_stripe_payload(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        self.server
            .post("/api/payment-webhook")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .text(payload)
    }

    /// Write a pending story directly, as checkout would.
    pub fn seed_pending_story(&self, user: &str, story: &str, template: &str) -> UserStory {
        let record = UserStory::new_pending(
            StoryId::new(story).unwrap(),
            UserId::new(user).unwrap(),
            "parent@example.com",
            TemplateId::new(template).unwrap(),
            Default::default(),
            chrono::Utc::now(),
        );
        self.store
            .put_record(&story_key(user, story), &record)
            .unwrap();
        record
    }

    /// Read a story record.
    pub fn story(&self, user: &str, story: &str) -> Option<UserStory> {
        self.store
            .get_record::<UserStory>(&story_key(user, story))
            .unwrap()
            .map(|r| r.value)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with every collaborator configured.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        app_url: APP_URL.into(),
        stripe_api_key: Some("sk_test_unused".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        stripe_price_id: Some(PRICE_ID.into()),
        automation_api_key: Some(API_KEY.into()),
        cors_origins: vec!["*".into()],
        ..ServiceConfig::default()
    }
}

pub fn with_api_key(request: TestRequest, key: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_str(key).unwrap(),
    )
}

pub fn story_key(user: &str, story: &str) -> RecordKey {
    RecordKey::user_story(&UserId::new(user).unwrap(), &StoryId::new(story).unwrap())
}

/// A `checkout.session.completed` event carrying correlation metadata.
pub fn completed_event(event_id: &str, user: &str, story: &str, template: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1_767_225_600,
        "data": {
            "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "amount_total": 1999,
                "currency": "usd",
                "customer_details": { "email": "parent@example.com" },
                "payment_intent": "pi_test_1",
                "metadata": { "storyId": story, "userId": user, "templateId": template }
            }
        }
    })
}

/// A session event of `kind` with arbitrary session fields.
pub fn session_event(kind: &str, session: Value) -> Value {
    json!({
        "id": "evt_test",
        "type": kind,
        "created": 1_767_225_600,
        "data": { "object": session }
    })
}
