//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `NEWSLETTER_*` and `UPSTASH_REDIS_URL` environment overrides.
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides using an arbitrary variable lookup.
///
/// `NEWSLETTER_REDIS_URL` wins over `UPSTASH_REDIS_URL` when both are set.
pub fn apply_overrides_from(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("NEWSLETTER_BIND") {
        config.listener.bind_address = bind;
    }
    if let Some(url) = lookup("NEWSLETTER_REDIS_URL").or_else(|| lookup("UPSTASH_REDIS_URL")) {
        config.store.redis_url = url;
    }
    if let Some(key) = lookup("NEWSLETTER_DEBUG_KEY") {
        config.debug.api_key = key;
    }
}
