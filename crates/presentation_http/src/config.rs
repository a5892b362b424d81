//! Server configuration
//!
//! Loaded from an optional `cloudhook.toml` in the working directory,
//! overridable through `CLOUDHOOK_*` environment variables (`__` as the
//! nesting separator, e.g. `CLOUDHOOK_WHATSAPP__ACCESS_TOKEN`).

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Webhook endpoint settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the provider delivers webhooks to
    pub webhook_path: String,
    /// Token echoed back during the provider's subscription handshake
    pub verify_token: String,
    /// App secret for request signature verification; verification is
    /// skipped when unset
    pub app_secret: Option<SecretString>,
    /// Bound of the queue between the endpoint and the dispatch worker
    pub queue_capacity: usize,
    pub whatsapp: OutboundConfig,
}

/// Outbound Graph API settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub access_token: Option<SecretString>,
    pub phone_number_id: Option<String>,
    pub api_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            webhook_path: "/webhook/whatsapp".to_string(),
            verify_token: String::new(),
            app_secret: None,
            queue_capacity: 256,
            whatsapp: OutboundConfig::default(),
        }
    }
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            api_version: "v20.0".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from file and environment, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source fails to load or the result
    /// fails validation. A missing `verify_token` is fatal here rather
    /// than a per-request failure.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("cloudhook").required(false))
            .add_source(
                config::Environment::with_prefix("CLOUDHOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verify_token.is_empty() {
            return Err(ConfigError::Invalid("verify_token must be set"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1"));
        }
        if !self.webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid("webhook_path must start with '/'"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("webhook_path", &self.webhook_path)
            .field("verify_token", &"[REDACTED]")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("queue_capacity", &self.queue_capacity)
            .field("whatsapp", &self.whatsapp)
            .finish()
    }
}

impl std::fmt::Debug for OutboundConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundConfig")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("phone_number_id", &self.phone_number_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}
