//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! rules. Every problem is reported, not just the first.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::{AppConfig, StoreBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const REDIS_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    for origin in &config.listener.allowed_origins {
        if HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "listener.allowed_origins",
                format!("'{origin}' is not a valid header value"),
            ));
        }
    }

    if config.store.backend == StoreBackend::Redis {
        match url::Url::parse(&config.store.redis_url) {
            Ok(url) if REDIS_SCHEMES.contains(&url.scheme()) => {}
            Ok(url) => errors.push(ValidationError::new(
                "store.redis_url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("store.redis_url", e.to_string())),
        }
        if config.store.connect_timeout_ms == 0 {
            errors.push(ValidationError::new("store.connect_timeout_ms", "must be > 0"));
        }
    }

    let resolver = &config.resolver;
    for (i, prefix) in resolver.key_prefixes.iter().enumerate() {
        if prefix.is_empty() {
            errors.push(ValidationError::new("resolver.key_prefixes", "prefix must not be empty"));
        } else if prefix.contains([':', '*', '?', '[', ']', '\\']) {
            errors.push(ValidationError::new(
                "resolver.key_prefixes",
                format!("prefix '{prefix}' contains a separator or glob character"),
            ));
        }
        if resolver.key_prefixes[..i].contains(prefix) {
            errors.push(ValidationError::new(
                "resolver.key_prefixes",
                format!("duplicate prefix '{prefix}'"),
            ));
        }
    }
    if resolver.key_prefixes.is_empty() && !resolver.try_raw_key && !resolver.wildcard_enabled {
        errors.push(ValidationError::new(
            "resolver",
            "no key pattern enabled: add a prefix, try_raw_key or wildcard_enabled",
        ));
    }
    if resolver.wildcard_scan_limit == 0 {
        errors.push(ValidationError::new("resolver.wildcard_scan_limit", "must be > 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if config.debug.enabled && config.debug.api_key.trim().is_empty() {
        errors.push(ValidationError::new(
            "debug.api_key",
            "required when the debug surface is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
