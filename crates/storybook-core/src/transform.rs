//! Transient photo transform records.
//!
//! A `Transformation` lives under `transformations/{userId}/{jobId}` only
//! while the external image transform runs. The first status read that sees a
//! terminal state deletes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TemplateId;

/// Message recorded when the worker reports an error without text.
pub const DEFAULT_TRANSFORM_ERROR: &str = "Unknown error occurred";

/// Lifecycle state of a transform job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformStatus {
    /// Running on the worker.
    Processing,
    /// Finished with an image.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TransformStatus {
    /// Whether the job has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A photo transform job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    /// Current state.
    pub status: TransformStatus,
    /// Template the photo is being prepared for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Source photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Result image, set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_image_url: Option<String>,
    /// Error text, set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the service registered the job; absent for worker-created records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last event time.
    pub updated_at: DateTime<Utc>,
}

impl Transformation {
    /// A freshly registered job.
    #[must_use]
    pub fn registered(template_id: TemplateId, photo_url: String, now: DateTime<Utc>) -> Self {
        Self {
            status: TransformStatus::Processing,
            template_id: Some(template_id),
            photo_url: Some(photo_url),
            transformed_image_url: None,
            error: None,
            created_at: Some(now),
            updated_at: now,
        }
    }

    /// A record created by a `start` event for a job the service never saw.
    #[must_use]
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            status: TransformStatus::Processing,
            template_id: None,
            photo_url: None,
            transformed_image_url: None,
            error: None,
            created_at: None,
            updated_at: now,
        }
    }

    /// Apply a `start` event.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = TransformStatus::Processing;
        self.updated_at = now;
    }

    /// Apply a `complete` event.
    pub fn mark_completed(&mut self, url: impl Into<String>, now: DateTime<Utc>) {
        self.status = TransformStatus::Completed;
        self.transformed_image_url = Some(url.into());
        self.error = None;
        self.updated_at = now;
    }

    /// Apply an `error` event; `None` records the default message.
    pub fn mark_failed(&mut self, error: Option<String>, now: DateTime<Utc>) {
        self.status = TransformStatus::Failed;
        self.error = Some(
            error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TRANSFORM_ERROR.to_string()),
        );
        self.updated_at = now;
    }

    /// The outcome a poller should see for this record.
    #[must_use]
    pub fn resolution(&self) -> TransformResolution {
        match self.status {
            TransformStatus::Processing => TransformResolution::Pending,
            TransformStatus::Completed => match &self.transformed_image_url {
                Some(url) => TransformResolution::Completed {
                    transformed_image_url: url.clone(),
                },
                None => TransformResolution::Failed {
                    error: "transform completed without an image".into(),
                },
            },
            TransformStatus::Failed => TransformResolution::Failed {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TRANSFORM_ERROR.to_string()),
            },
        }
    }
}

/// What a status poll reports.
///
/// `Pending` covers a running job, a job that was never registered, and a job
/// whose terminal result was already consumed by an earlier poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformResolution {
    /// No terminal result available.
    Pending,
    /// The transform produced an image.
    Completed {
        /// Result image URL.
        transformed_image_url: String,
    },
    /// The transform failed.
    Failed {
        /// Error text.
        error: String,
    },
}

impl TransformResolution {
    /// Whether this resolution is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
