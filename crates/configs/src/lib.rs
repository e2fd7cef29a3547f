//! # configs
//!
//! Layered settings: built-in defaults, then an optional
//! `config/sanctuary.{toml,yaml,json}` file, then `SANCTUARY__*` environment
//! variables (`SANCTUARY__AUTH__JWT_SECRET`, `SANCTUARY__SERVER__PORT`, ...).
//! A `.env` file is read first when present.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const ENV_PREFIX: &str = "SANCTUARY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Absent means the in-memory store.
    pub url: Option<SecretString>,
    pub max_connections: u32,
    /// Comma-separated profile ids created at startup by the in-memory store,
    /// which has no profile source of its own.
    pub memory_profiles: String,
}

impl DatabaseSettings {
    pub fn memory_profile_ids(&self) -> Vec<String> {
        self.memory_profiles
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationSettings {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub auto_approve: bool,
}

impl ModerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub issuer: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub moderation: ModerationSettings,
    pub auth: AuthSettings,
}

impl Settings {
    /// Reads `.env`, the optional config file, and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let builder = defaults(Config::builder())?
            .add_source(File::with_name("config/sanctuary").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Defaults plus explicit `key = value` overrides, without touching the
    /// environment or the filesystem.
    pub fn from_overrides(overrides: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let mut builder = defaults(Config::builder())?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.moderation.timeout_ms == 0 {
            return Err(ConfigError::Invalid("moderation.timeout_ms must be positive".into()));
        }
        if !self.moderation.endpoint.starts_with("http://")
            && !self.moderation.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "moderation.endpoint is not an http(s) URL: {}",
                self.moderation.endpoint
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        Ok(())
    }
}

fn defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3001)?
        .set_default("server.log_format", "pretty")?
        .set_default("database.max_connections", 10)?
        .set_default("database.memory_profiles", "")?
        .set_default("moderation.endpoint", "http://localhost:8000/api/v1/moderate")?
        .set_default("moderation.timeout_ms", 10_000)?
        .set_default("moderation.auto_approve", false)?
        .set_default("auth.issuer", "sanctuary")
}
