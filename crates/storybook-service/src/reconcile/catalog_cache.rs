//! Read-side catalog cache.
//!
//! Holds a snapshot of `storyTemplates/` plus lazily loaded reader details.
//! Catalog writes call `invalidate`, and `watch` keeps the cache coherent with
//! writes that bypass this process's `CatalogService`.
//!
//! Detail loads read the store without holding the lock, so each load is
//! tagged with the cache generation it started in. `invalidate` bumps the
//! generation, and a load that finishes afterwards is returned but not kept.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use storybook_core::{StoryBasicInfo, StoryDetails, StoryTemplate, TemplateId};
use storybook_store::{Received, RecordKey, Store, StoreExt};

use crate::error::ApiError;

/// Cached catalog reads.
pub struct CatalogCache {
    store: Arc<dyn Store>,
    templates: RwLock<Option<Arc<Vec<StoryBasicInfo>>>>,
    details: RwLock<DetailsCache>,
}

#[derive(Default)]
struct DetailsCache {
    generation: u64,
    entries: HashMap<TemplateId, StoryDetails>,
}

impl CatalogCache {
    /// Create an empty cache.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            templates: RwLock::new(None),
            details: RwLock::new(DetailsCache::default()),
        }
    }

    /// Catalog cards ordered by book number.
    pub async fn templates(&self) -> Result<Arc<Vec<StoryBasicInfo>>, ApiError> {
        if let Some(cached) = self.templates.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let mut guard = self.templates.write().await;
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }

        let mut cards: Vec<StoryBasicInfo> = self
            .store
            .list_records::<StoryTemplate>(&RecordKey::story_templates())?
            .into_iter()
            .map(|(_, record)| record.value.basic)
            .collect();
        cards.sort_by(|a, b| {
            a.book_number
                .cmp(&b.book_number)
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::debug!(count = cards.len(), "Catalog cache loaded");
        let cards = Arc::new(cards);
        *guard = Some(Arc::clone(&cards));
        Ok(cards)
    }

    /// The current weekly favorite, if any.
    pub async fn weekly_favorite(&self) -> Result<Option<StoryBasicInfo>, ApiError> {
        Ok(self
            .templates()
            .await?
            .iter()
            .find(|card| card.is_weekly_favorite)
            .cloned())
    }

    /// Reader details for one template.
    pub async fn details(&self, id: &TemplateId) -> Result<Option<StoryDetails>, ApiError> {
        let generation = {
            let cache = self.details.read().await;
            if let Some(details) = cache.entries.get(id) {
                return Ok(Some(details.clone()));
            }
            cache.generation
        };

        let Some(record) = self
            .store
            .get_record::<StoryTemplate>(&RecordKey::story_template(id))?
        else {
            return Ok(None);
        };

        let details = record.value.details;
        self.remember(id, generation, &details).await;
        Ok(Some(details))
    }

    /// Keep `details` unless the cache was invalidated since `generation`.
    async fn remember(&self, id: &TemplateId, generation: u64, details: &StoryDetails) -> bool {
        let mut cache = self.details.write().await;
        if cache.generation != generation {
            tracing::debug!(template_id = %id, "Discarding details loaded before invalidation");
            return false;
        }
        cache.entries.insert(id.clone(), details.clone());
        true
    }

    /// Drop everything cached.
    pub async fn invalidate(&self) {
        *self.templates.write().await = None;
        let mut details = self.details.write().await;
        details.generation += 1;
        details.entries.clear();
        drop(details);
        tracing::debug!("Catalog cache invalidated");
    }

    /// Invalidate on every committed catalog change, and after any lag,
    /// until the store closes.
    #[must_use]
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let mut subscription = self.store.subscribe(&RecordKey::story_templates());
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(received) = subscription.recv_or_lag().await {
                match received {
                    Received::Change(event) => {
                        tracing::trace!(key = %event.key, op = ?event.op, "Catalog change observed");
                    }
                    // Missed events may include catalog writes.
                    Received::Lagged(skipped) => {
                        tracing::warn!(skipped, "Catalog watcher lagged, invalidating");
                    }
                }
                cache.invalidate().await;
            }
            tracing::debug!("Catalog watcher stopped");
        })
    }
}
