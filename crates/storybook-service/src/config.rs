//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Default timeout for calls to the automation platform.
pub const DEFAULT_AUTOMATION_TIMEOUT_SECONDS: u64 = 10;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/storybook").
    pub data_dir: String,

    /// Public URL of the web app, used for checkout redirects.
    pub app_url: String,

    /// Stripe secret API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret. Payment webhooks are rejected without it.
    pub stripe_webhook_secret: Option<String>,

    /// Stripe price charged for one personalized story.
    pub stripe_price_id: Option<String>,

    /// Shared key the automation platform presents in `x-api-key`, and that
    /// we present when calling it.
    pub automation_api_key: Option<String>,

    /// Automation webhook that starts story generation.
    pub automation_story_url: Option<String>,

    /// Automation webhook that starts a photo transform.
    pub automation_transform_url: Option<String>,

    /// Timeout for automation calls in seconds.
    pub automation_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(default)]
    price_id: Option<String>,
}

/// Automation platform secrets file structure.
#[derive(Debug, Deserialize)]
struct AutomationSecrets {
    api_key: String,
    #[serde(default)]
    story_url: Option<String>,
    #[serde(default)]
    transform_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (stripe_api_key, stripe_webhook_secret, stripe_price_id) = load_stripe_secrets();
        let (automation_api_key, automation_story_url, automation_transform_url) =
            load_automation_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/storybook".into()),
            app_url: std::env::var("APP_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .trim_end_matches('/')
                .to_string(),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_price_id,
            automation_api_key,
            automation_story_url,
            automation_transform_url,
            automation_timeout_seconds: env_parse("AUTOMATION_TIMEOUT_SECONDS")
                .unwrap_or(DEFAULT_AUTOMATION_TIMEOUT_SECONDS),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

const SECRETS_DIRS: [&str; 3] = [".secrets", "storybook/.secrets", "../.secrets"];

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>, Option<String>) {
    for dir in &SECRETS_DIRS {
        let path = format!("{dir}/stripe.json");
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(&path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (
                Some(secrets.api_key),
                secrets
                    .webhook_secret
                    .or_else(|| std::env::var("STRIPE_WEBHOOK_SECRET").ok()),
                secrets
                    .price_id
                    .or_else(|| std::env::var("STRIPE_PRICE_ID").ok()),
            );
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
        std::env::var("STRIPE_PRICE_ID").ok(),
    )
}

/// Load automation platform secrets from file or environment.
fn load_automation_secrets() -> (Option<String>, Option<String>, Option<String>) {
    for dir in &SECRETS_DIRS {
        let path = format!("{dir}/automation.json");
        if let Ok(secrets) = load_secrets_file::<AutomationSecrets>(&path) {
            tracing::info!(path = %path, "Loaded automation secrets from file");
            return (
                Some(secrets.api_key),
                secrets
                    .story_url
                    .or_else(|| std::env::var("AUTOMATION_STORY_URL").ok()),
                secrets
                    .transform_url
                    .or_else(|| std::env::var("AUTOMATION_TRANSFORM_URL").ok()),
            );
        }
    }

    tracing::debug!("Automation secrets file not found, using environment variables");
    (
        std::env::var("AUTOMATION_API_KEY").ok(),
        std::env::var("AUTOMATION_STORY_URL").ok(),
        std::env::var("AUTOMATION_TRANSFORM_URL").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/storybook".into(),
            app_url: "http://localhost:5173".into(),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_price_id: None,
            automation_api_key: None,
            automation_story_url: None,
            automation_transform_url: None,
            automation_timeout_seconds: DEFAULT_AUTOMATION_TIMEOUT_SECONDS,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
