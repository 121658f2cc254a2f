//! Application state.

use std::sync::Arc;
use std::time::Duration;

use storybook_store::Store;

use crate::automation::{AutomationClient, AutomationError, AutomationPlatform};
use crate::config::ServiceConfig;
use crate::reconcile::{
    CatalogCache, CatalogService, CheckoutService, PaymentReconciler, StoryCompletion,
    TransformCoordinator,
};
use crate::stripe::{PaymentProvider, StripeClient};

/// Application state shared across handlers.
pub struct AppState {
    /// The record store.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Checkout initiation.
    pub checkout: CheckoutService,

    /// Payment webhook handling.
    pub payments: PaymentReconciler,

    /// Photo transform jobs.
    pub transforms: TransformCoordinator,

    /// Story generation callbacks.
    pub stories: StoryCompletion,

    /// Catalog writes.
    pub catalog: CatalogService,

    /// Catalog reads.
    pub catalog_cache: Arc<CatalogCache>,
}

impl AppState {
    /// Create the application state, building the Stripe and automation
    /// clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the automation HTTP client cannot be built.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, AutomationError> {
        let provider = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client) as Arc<dyn PaymentProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if provider.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - payment webhooks will be rejected");
        }
        if config.automation_story_url.is_none() {
            tracing::warn!("Automation story URL not configured - paid stories will not be generated");
        }

        let automation = AutomationClient::new(
            config.automation_api_key.clone(),
            config.automation_story_url.clone(),
            config.automation_transform_url.clone(),
            Duration::from_secs(config.automation_timeout_seconds),
        )?;

        Ok(Self::with_collaborators(
            store,
            config,
            provider,
            Arc::new(automation),
        ))
    }

    /// Create the application state around explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        provider: Option<Arc<dyn PaymentProvider>>,
        automation: Arc<dyn AutomationPlatform>,
    ) -> Self {
        let catalog_cache = Arc::new(CatalogCache::new(Arc::clone(&store)));

        Self {
            checkout: CheckoutService::new(
                Arc::clone(&store),
                provider.clone(),
                config.stripe_price_id.clone(),
                config.app_url.clone(),
            ),
            payments: PaymentReconciler::new(
                Arc::clone(&store),
                provider,
                Arc::clone(&automation),
                config.stripe_webhook_secret.clone(),
            ),
            transforms: TransformCoordinator::new(Arc::clone(&store), automation),
            stories: StoryCompletion::new(Arc::clone(&store)),
            catalog: CatalogService::new(Arc::clone(&store), Arc::clone(&catalog_cache)),
            catalog_cache,
            store,
            config,
        }
    }
}
