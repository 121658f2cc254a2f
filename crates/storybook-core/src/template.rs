//! Story template (catalog) records.
//!
//! Catalog entries are written only by the catalog webhook. Field names keep
//! the catalog's established wire spelling (`thumbnailURL`, `imageURLs`, ...)
//! because the automation platform already emits it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TemplateId;

/// Catalog card information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryBasicInfo {
    /// Template id.
    pub id: TemplateId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Position in the catalog.
    #[serde(rename = "bookNumber", default)]
    pub book_number: u32,
    /// Landscape preview image.
    #[serde(rename = "thumbnailURL", default)]
    pub thumbnail_url: String,
    /// Portrait cover image.
    #[serde(rename = "coverImageURL", default)]
    pub cover_image_url: String,
    /// Example photo shown before personalization.
    #[serde(rename = "originalPhotoURL", default)]
    pub original_photo_url: String,
    /// Page count.
    #[serde(rename = "numberOfPages", default)]
    pub number_of_pages: u32,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Weekly favorite flag. At most one template carries it.
    #[serde(rename = "isWeeklyFavorite", default)]
    pub is_weekly_favorite: bool,
}

/// Reader content of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDetails {
    /// Spread images.
    #[serde(rename = "imageURLs", default)]
    pub image_urls: Vec<String>,
    /// Page texts.
    #[serde(rename = "storyTexts", default)]
    pub story_texts: Vec<String>,
    /// Narration audio.
    #[serde(rename = "narrationURLs", default)]
    pub narration_urls: Vec<String>,
}

/// A catalog entry as stored under `storyTemplates/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryTemplate {
    /// Basic information.
    #[serde(flatten)]
    pub basic: StoryBasicInfo,
    /// Reader content.
    #[serde(flatten)]
    pub details: StoryDetails,
    /// Creation time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl StoryTemplate {
    /// Build a template from webhook parts.
    ///
    /// `created_at` is carried over from an existing record on update.
    #[must_use]
    pub fn from_parts(
        basic: StoryBasicInfo,
        details: StoryDetails,
        created_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            basic,
            details,
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        }
    }

    /// Template id.
    #[must_use]
    pub fn id(&self) -> &TemplateId {
        &self.basic.id
    }

    /// Whether this template is the weekly favorite.
    #[must_use]
    pub fn is_weekly_favorite(&self) -> bool {
        self.basic.is_weekly_favorite
    }

    /// Set or clear the weekly favorite flag.
    ///
    /// Returns `true` if the flag changed.
    pub fn set_weekly_favorite(&mut self, value: bool, now: DateTime<Utc>) -> bool {
        if self.basic.is_weekly_favorite == value {
            return false;
        }
        self.basic.is_weekly_favorite = value;
        self.updated_at = now;
        true
    }
}

/// Catalog pointer naming the current weekly favorite.
///
/// Stored at `catalog/weeklyFavorite`. The pointer is written before the
/// template flags are reconciled, so it records the intended favorite even if
/// the flag sweep stops partway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyFavorite {
    /// Intended favorite, or `None` when the catalog has none.
    pub id: Option<TemplateId>,
    /// When the pointer last changed.
    pub updated_at: DateTime<Utc>,
}
