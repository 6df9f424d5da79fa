//! Secret retrieval for connection credentials.
//!
//! Secrets are read once at startup. Any missing secret is a configuration
//! error and no run is started.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::source::RedditCredentials;
use crate::types::ConfigError;

pub const STREAM_CONNECTION_STRING: &str = "EventHubConnectionString";
pub const REDDIT_CLIENT_ID: &str = "RedditClientId";
pub const REDDIT_CLIENT_SECRET: &str = "RedditClientSecret";
pub const REDDIT_USERNAME: &str = "RedditUsername";
pub const REDDIT_PASSWORD: &str = "RedditPassword";
pub const ANALYTICS_ENDPOINT: &str = "AzureCognitiveServicesEndpoint";
pub const ANALYTICS_KEY: &str = "AzureCognitiveServicesKeyA";

/// Looks up named secrets.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, ConfigError>;
}

/// Reads secrets from environment variables.
///
/// `EventHubConnectionString` is read from `EVENT_HUB_CONNECTION_STRING`,
/// optionally behind a prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: Option<String>,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `{PREFIX}_{NAME}` instead of `{NAME}`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
        }
    }

    /// Environment variable holding the named secret.
    pub fn env_key(&self, name: &str) -> String {
        let key = screaming_snake(name);
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key,
        }
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        std::env::var(self.env_key(name))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSecret(name.to_string()))
    }
}

/// Fixed in-memory secrets.
#[async_trait]
impl SecretProvider for HashMap<String, String> {
    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingSecret(name.to_string()))
    }
}

/// Every credential the service needs, loaded in one pass.
#[derive(Clone)]
pub struct ServiceSecrets {
    pub stream_connection: String,
    pub reddit: RedditCredentials,
    pub analytics_endpoint: String,
    pub analytics_key: String,
}

impl std::fmt::Debug for ServiceSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSecrets")
            .field("analytics_endpoint", &self.analytics_endpoint)
            .finish_non_exhaustive()
    }
}

impl ServiceSecrets {
    /// Fetch all secrets from the provider.
    pub async fn load(provider: &dyn SecretProvider) -> Result<Self, ConfigError> {
        let secrets = Self {
            stream_connection: provider.get_secret(STREAM_CONNECTION_STRING).await?,
            reddit: RedditCredentials {
                client_id: provider.get_secret(REDDIT_CLIENT_ID).await?,
                client_secret: provider.get_secret(REDDIT_CLIENT_SECRET).await?,
                username: provider.get_secret(REDDIT_USERNAME).await?,
                password: provider.get_secret(REDDIT_PASSWORD).await?,
            },
            analytics_endpoint: provider.get_secret(ANALYTICS_ENDPOINT).await?,
            analytics_key: provider.get_secret(ANALYTICS_KEY).await?,
        };
        info!("Loaded service secrets");
        Ok(secrets)
    }
}

/// `AzureCognitiveServicesKeyA` -> `AZURE_COGNITIVE_SERVICES_KEY_A`
fn screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            out.push('_');
        }
        out.extend(c.to_uppercase());
        prev = Some(c);
    }
    out
}
