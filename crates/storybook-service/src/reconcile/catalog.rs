//! Catalog maintenance.
//!
//! The automation platform creates, updates and deletes story templates and
//! picks the weekly favorite. At most one template carries
//! `isWeeklyFavorite`. The intended favorite is recorded first in the
//! `catalog/weeklyFavorite` pointer; the template flags are then converged
//! to it with per-record atomic updates. `repair` re-runs that convergence,
//! so a sweep interrupted by a store failure is finished by the next call.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use storybook_core::{StoryBasicInfo, StoryDetails, StoryTemplate, TemplateId, WeeklyFavorite};
use storybook_store::{Mutation, RecordKey, Store, StoreExt};

use super::catalog_cache::CatalogCache;
use crate::error::ApiError;

/// Catalog webhook request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRequest {
    /// `create`, `update`, `delete` or `set-weekly-favorite`.
    #[serde(default)]
    pub action: Option<String>,
    /// Action data.
    #[serde(default)]
    pub data: CatalogData,
}

/// Catalog action data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    /// Target template for `update` and `delete`.
    #[serde(default)]
    pub id: Option<String>,
    /// Template content for `create` and `update`.
    #[serde(default)]
    pub story: Option<TemplatePayload>,
    /// Target for `set-weekly-favorite`.
    #[serde(default)]
    pub weekly_favorite_id: Option<String>,
}

/// Template content as sent by the automation platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    /// Card information.
    pub basic_info: StoryBasicInfo,
    /// Reader content.
    #[serde(default)]
    pub details: StoryDetails,
}

/// Catalog actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogAction {
    /// Add a template.
    Create,
    /// Replace a template, keeping its creation time.
    Update,
    /// Remove a template.
    Delete,
    /// Make one template the weekly favorite.
    SetWeeklyFavorite,
}

impl std::str::FromStr for CatalogAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "set-weekly-favorite" => Ok(Self::SetWeeklyFavorite),
            _ => Err(ApiError::BadRequest("Invalid action".into())),
        }
    }
}

/// Result of a dispatched catalog action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOutcome {
    /// Response message.
    pub message: &'static str,
    /// Id of the template a `create` wrote.
    pub created_id: Option<TemplateId>,
}

impl CatalogOutcome {
    fn message(message: &'static str) -> Self {
        Self {
            message,
            created_id: None,
        }
    }
}

/// Writes the story template catalog.
pub struct CatalogService {
    store: Arc<dyn Store>,
    cache: Arc<CatalogCache>,
}

impl CatalogService {
    /// Create the service.
    pub fn new(store: Arc<dyn Store>, cache: Arc<CatalogCache>) -> Self {
        Self { store, cache }
    }

    /// Dispatch a webhook request.
    pub async fn handle(&self, request: CatalogRequest) -> Result<CatalogOutcome, ApiError> {
        let action: CatalogAction = request
            .action
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("Invalid action".into()))?
            .parse()?;
        let data = request.data;

        let result = match action {
            CatalogAction::Create => {
                let story = data
                    .story
                    .ok_or_else(|| ApiError::BadRequest("Missing story data".into()))?;
                self.create(story).map(|template| CatalogOutcome {
                    message: "Story created successfully",
                    created_id: Some(template.id().clone()),
                })
            }
            CatalogAction::Update => {
                let story = data
                    .story
                    .ok_or_else(|| ApiError::BadRequest("Missing story data".into()))?;
                let id = match data.id {
                    Some(id) => TemplateId::new(id)?,
                    None => story.basic_info.id.clone(),
                };
                self.update(&id, story)
                    .map(|_| CatalogOutcome::message("Story updated successfully"))
            }
            CatalogAction::Delete => {
                let id = data
                    .id
                    .ok_or_else(|| ApiError::BadRequest("Missing story id".into()))?;
                self.delete(&TemplateId::new(id)?)
                    .map(|_| CatalogOutcome::message("Story deleted successfully"))
            }
            CatalogAction::SetWeeklyFavorite => {
                let id = data
                    .weekly_favorite_id
                    .ok_or_else(|| ApiError::BadRequest("Missing weekly favorite id".into()))?;
                self.set_weekly_favorite(&TemplateId::new(id)?)
                    .map(|()| CatalogOutcome::message("Weekly favorite updated successfully"))
            }
        };

        // Partial application is possible on failure, so invalidate either way.
        self.cache.invalidate().await;
        result
    }

    /// Add a template.
    pub fn create(&self, payload: TemplatePayload) -> Result<StoryTemplate, ApiError> {
        let id = payload.basic_info.id.clone();
        self.write(&id, payload, false)
    }

    /// Replace a template, keeping its creation time.
    pub fn update(&self, id: &TemplateId, payload: TemplatePayload) -> Result<StoryTemplate, ApiError> {
        self.write(id, payload, true)
    }

    fn write(
        &self,
        id: &TemplateId,
        mut payload: TemplatePayload,
        keep_created_at: bool,
    ) -> Result<StoryTemplate, ApiError> {
        payload.basic_info.id = id.clone();
        let favorite = payload.basic_info.is_weekly_favorite;

        if favorite {
            self.repair()?;
            self.point_to(id)?;
            self.clear_flags_except(Some(id))?;
        } else {
            self.release_pointer(id)?;
        }

        let key = RecordKey::story_template(id);
        let now = Utc::now();
        let updated = self
            .store
            .update_record::<StoryTemplate, ApiError, _>(&key, |current| {
                let created_at = current.filter(|_| keep_created_at).map(|t| t.created_at);
                Ok(Mutation::Put(StoryTemplate::from_parts(
                    payload.basic_info.clone(),
                    payload.details.clone(),
                    created_at,
                    now,
                )))
            })?;

        tracing::info!(
            template_id = %id,
            weekly_favorite = %favorite,
            existed = %updated.before.is_some(),
            "Story template written"
        );
        updated
            .after
            .ok_or_else(|| ApiError::Internal("template write produced no record".into()))
    }

    /// Remove a template. Returns whether it existed.
    ///
    /// Removing the favorite leaves the catalog without one.
    pub fn delete(&self, id: &TemplateId) -> Result<bool, ApiError> {
        self.release_pointer(id)?;
        let existed = self.store.delete(&RecordKey::story_template(id))?;
        tracing::info!(template_id = %id, existed = %existed, "Story template deleted");
        Ok(existed)
    }

    /// Make `id` the only weekly favorite.
    pub fn set_weekly_favorite(&self, id: &TemplateId) -> Result<(), ApiError> {
        self.repair()?;

        let key = RecordKey::story_template(id);
        if self.store.get(&key)?.is_none() {
            return Err(ApiError::NotFound(format!("Story template not found: {id}")));
        }

        self.point_to(id)?;
        self.clear_flags_except(Some(id))?;
        if !self.flag(id)? {
            // Deleted between the existence check and the flag.
            self.release_pointer(id)?;
            return Err(ApiError::NotFound(format!("Story template not found: {id}")));
        }

        tracing::info!(template_id = %id, "Weekly favorite set");
        Ok(())
    }

    /// Converge template flags to the favorite pointer.
    ///
    /// Without a pointer, the most recently updated flagged template is
    /// adopted as the favorite. Returns the favorite after repair.
    pub fn repair(&self) -> Result<Option<TemplateId>, ApiError> {
        let pointer = self
            .store
            .get_record::<WeeklyFavorite>(&RecordKey::weekly_favorite())?
            .and_then(|p| p.value.id);

        let target = match pointer {
            Some(id) => Some(id),
            None => {
                let adopted = self
                    .store
                    .list_records::<StoryTemplate>(&RecordKey::story_templates())?
                    .into_iter()
                    .map(|(_, record)| record.value)
                    .filter(StoryTemplate::is_weekly_favorite)
                    .max_by_key(|t| t.updated_at)
                    .map(|t| t.basic.id);
                if let Some(id) = &adopted {
                    tracing::info!(template_id = %id, "Adopting flagged template as weekly favorite");
                    self.point_to(id)?;
                }
                adopted
            }
        };

        let Some(id) = target else {
            return Ok(None);
        };

        let cleared = self.clear_flags_except(Some(&id))?;
        if !self.flag(&id)? {
            tracing::warn!(template_id = %id, "Weekly favorite pointer names a missing template");
            self.release_pointer(&id)?;
            return Ok(None);
        }
        if cleared > 0 {
            tracing::warn!(template_id = %id, cleared = %cleared, "Repaired duplicate weekly favorites");
        }
        Ok(Some(id))
    }

    fn point_to(&self, id: &TemplateId) -> Result<(), ApiError> {
        // Written before any template flag so an interrupted sweep can resume.
        let now = Utc::now();
        self.store
            .update_record::<WeeklyFavorite, ApiError, _>(&RecordKey::weekly_favorite(), |current| {
                if current.as_ref().and_then(|p| p.id.as_ref()) == Some(id) {
                    return Ok(Mutation::Keep);
                }
                Ok(Mutation::Put(WeeklyFavorite {
                    id: Some(id.clone()),
                    updated_at: now,
                }))
            })?;
        Ok(())
    }

    /// Clear the pointer if it names `id`.
    fn release_pointer(&self, id: &TemplateId) -> Result<(), ApiError> {
        let now = Utc::now();
        self.store
            .update_record::<WeeklyFavorite, ApiError, _>(&RecordKey::weekly_favorite(), |current| {
                match current {
                    Some(mut pointer) if pointer.id.as_ref() == Some(id) => {
                        pointer.id = None;
                        pointer.updated_at = now;
                        Ok(Mutation::Put(pointer))
                    }
                    _ => Ok(Mutation::Keep),
                }
            })?;
        Ok(())
    }

    /// Clear the flag on every template other than `keep`. Returns how many changed.
    fn clear_flags_except(&self, keep: Option<&TemplateId>) -> Result<usize, ApiError> {
        let now = Utc::now();
        let mut cleared = 0;
        for (key, record) in self
            .store
            .list_records::<StoryTemplate>(&RecordKey::story_templates())?
        {
            if !record.value.is_weekly_favorite() || Some(record.value.id()) == keep {
                continue;
            }
            let updated = self
                .store
                .update_record::<StoryTemplate, ApiError, _>(&key, |current| {
                    Ok(match current {
                        Some(mut t) => {
                            if t.set_weekly_favorite(false, now) {
                                Mutation::Put(t)
                            } else {
                                Mutation::Keep
                            }
                        }
                        None => Mutation::Keep,
                    })
                })?;
            if updated.changed() {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Set the flag on `id`. Returns `false` if the template does not exist.
    fn flag(&self, id: &TemplateId) -> Result<bool, ApiError> {
        let now = Utc::now();
        let updated = self
            .store
            .update_record::<StoryTemplate, ApiError, _>(&RecordKey::story_template(id), |current| {
                Ok(match current {
                    Some(mut t) => {
                        if t.set_weekly_favorite(true, now) {
                            Mutation::Put(t)
                        } else {
                            Mutation::Keep
                        }
                    }
                    None => Mutation::Keep,
                })
            })?;
        Ok(updated.after.is_some())
    }
}
