//! Photo transform coordination.
//!
//! The automation platform reports transform progress through
//! `start`/`complete`/`error` events keyed by `(uid, transformId)`. The web
//! app polls for the outcome; the first poll that sees a terminal state
//! consumes the record.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use storybook_core::{
    JobId, TemplateId, TransformResolution, TransformStatus, Transformation, UserId,
};
use storybook_store::{Mutation, RecordKey, Store, StoreError, StoreExt};

use crate::automation::{AutomationPlatform, PhotoTransformRequest};
use crate::error::ApiError;

/// Transform lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformEventKind {
    /// Worker picked up the job.
    Start,
    /// Worker produced an image.
    Complete,
    /// Worker gave up.
    Error,
}

impl std::str::FromStr for TransformEventKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            other => Err(ApiError::BadRequest(format!("Invalid event type: {other}"))),
        }
    }
}

/// Event payload from the automation platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformEvent {
    /// `start`, `complete` or `error`.
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// Event data.
    #[serde(default)]
    pub data: TransformEventData,
}

/// Event data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformEventData {
    /// Owner.
    #[serde(default)]
    pub uid: Option<String>,
    /// Job id.
    #[serde(default)]
    pub transform_id: Option<String>,
    /// Result image for `complete`.
    #[serde(default)]
    pub transformed_image_url: Option<String>,
    /// Error text for `error`.
    #[serde(default)]
    pub error: Option<String>,
}

/// Status poll request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStatusRequest {
    /// Owner.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Job id.
    #[serde(default)]
    pub transform_id: Option<String>,
    /// Template the photo was for; informational.
    #[serde(default)]
    pub template_id: Option<String>,
}

/// Status poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStatusResponse {
    /// `false` only for a failed transform.
    pub success: bool,
    /// `pending`, `completed` or `failed`.
    pub status: &'static str,
    /// Result image on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_image_url: Option<String>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable outcome.
    pub message: String,
}

impl From<TransformResolution> for TransformStatusResponse {
    fn from(resolution: TransformResolution) -> Self {
        match resolution {
            TransformResolution::Pending => Self {
                success: true,
                status: "pending",
                transformed_image_url: None,
                error: None,
                message: "Transform still in progress".into(),
            },
            TransformResolution::Completed {
                transformed_image_url,
            } => Self {
                success: true,
                status: "completed",
                transformed_image_url: Some(transformed_image_url),
                error: None,
                message: "Photo transformed successfully".into(),
            },
            TransformResolution::Failed { error } => Self {
                success: false,
                status: "failed",
                transformed_image_url: None,
                message: error.clone(),
                error: Some(error),
            },
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {field}")))
}

/// Mediates photo transform jobs between the web app and the worker.
pub struct TransformCoordinator {
    store: Arc<dyn Store>,
    automation: Arc<dyn AutomationPlatform>,
}

impl TransformCoordinator {
    /// Create the coordinator.
    pub fn new(store: Arc<dyn Store>, automation: Arc<dyn AutomationPlatform>) -> Self {
        Self { store, automation }
    }

    /// Register a transform job and hand it to the worker.
    ///
    /// If the worker cannot be reached the record is removed again.
    pub async fn begin(
        &self,
        user_id: UserId,
        template_id: TemplateId,
        photo_url: String,
    ) -> Result<JobId, ApiError> {
        let job_id = JobId::generate();
        let key = RecordKey::transformation(&user_id, &job_id);
        let record = Transformation::registered(template_id.clone(), photo_url.clone(), Utc::now());
        self.store.create_record(&key, &record)?;

        let request = PhotoTransformRequest {
            user_id,
            transform_id: job_id.clone(),
            template_id,
            photo_url,
        };
        if let Err(e) = self.automation.request_photo_transform(&request).await {
            tracing::warn!(transform_id = %job_id, error = %e, "Photo transform request failed");
            if let Err(e) = self.store.delete(&key) {
                tracing::error!(key = %key, error = %e, "Failed to remove transform record");
            }
            return Err(ApiError::ExternalService(format!(
                "Failed to start photo transform: {e}"
            )));
        }

        tracing::info!(transform_id = %job_id, user_id = %request.user_id, "Photo transform started");
        Ok(job_id)
    }

    /// Apply a lifecycle event from the worker.
    ///
    /// Returns the status after the event, or `None` when no record exists.
    /// A `start` never reopens a job that already finished.
    pub fn apply_event(&self, event: TransformEvent) -> Result<Option<TransformStatus>, ApiError> {
        let kind: TransformEventKind = required(event.event_type, "type")?.parse()?;
        let user_id = UserId::new(required(event.data.uid, "data.uid")?)?;
        let job_id = JobId::new(required(event.data.transform_id, "data.transformId")?)?;

        let image_url = match kind {
            TransformEventKind::Complete => Some(required(
                event.data.transformed_image_url,
                "data.transformedImageUrl",
            )?),
            _ => None,
        };

        let key = RecordKey::transformation(&user_id, &job_id);
        let now = Utc::now();
        let updated = self
            .store
            .update_record::<Transformation, ApiError, _>(&key, |current| {
                // `begin` creates the record, so an absent one was consumed
                // already or never registered here.
                let Some(mut record) = current else {
                    tracing::info!(key = %key, event = ?kind, "Transform event for absent job ignored");
                    return Ok(Mutation::Keep);
                };
                match kind {
                    TransformEventKind::Start if record.status.is_terminal() => {
                        tracing::info!(key = %key, status = ?record.status, "Late start event ignored");
                        return Ok(Mutation::Keep);
                    }
                    TransformEventKind::Start => record.mark_processing(now),
                    TransformEventKind::Complete => {
                        record.mark_completed(image_url.clone().unwrap_or_default(), now);
                    }
                    TransformEventKind::Error => record.mark_failed(event.data.error.clone(), now),
                }
                Ok(Mutation::Put(record))
            })?;

        let status = updated.after.map(|record| record.status);
        tracing::info!(transform_id = %job_id, status = ?status, "Transform event applied");
        Ok(status)
    }

    /// Resolve a job for a poller.
    ///
    /// A terminal record is deleted at the version that was read, so exactly
    /// one concurrent poller receives the result; the others see `Pending`.
    /// An absent record also reports `Pending`: it cannot be told apart from
    /// a job that was already consumed.
    pub fn resolve(&self, user_id: &UserId, job_id: &JobId) -> Result<TransformResolution, ApiError> {
        let key = RecordKey::transformation(user_id, job_id);
        let Some(current) = self.store.get_record::<Transformation>(&key)? else {
            return Ok(TransformResolution::Pending);
        };

        let resolution = current.value.resolution();
        if !resolution.is_terminal() {
            return Ok(resolution);
        }

        match self.store.compare_and_delete(&key, current.version) {
            Ok(()) => {
                tracing::info!(transform_id = %job_id, "Transform result consumed");
                Ok(resolution)
            }
            Err(StoreError::Conflict { .. }) => {
                tracing::debug!(transform_id = %job_id, "Transform result consumed by another poller");
                Ok(TransformResolution::Pending)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and resolve a poll request.
    pub fn resolve_request(
        &self,
        request: TransformStatusRequest,
    ) -> Result<TransformStatusResponse, ApiError> {
        let user_id = UserId::new(required(request.user_id, "userId")?)?;
        let job_id = JobId::new(required(request.transform_id, "transformId")?)?;
        if let Some(template_id) = &request.template_id {
            tracing::debug!(transform_id = %job_id, template_id = %template_id, "Transform status poll");
        }
        self.resolve(&user_id, &job_id).map(Into::into)
    }
}
