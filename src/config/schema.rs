//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the reader.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the newsletter reader.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, CORS).
    pub listener: ListenerConfig,

    /// Key-value store connection.
    pub store: StoreConfig,

    /// Key pattern resolution settings.
    pub resolver: ResolverConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Developer diagnostics surface.
    pub debug: DebugConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Which key-value backend serves newsletter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection URL (`redis://`, `rediss://` for Upstash).
    pub redis_url: String,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Reconnect attempts made by the connection manager.
    pub reconnect_retries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_ms: 1000,
            reconnect_retries: 1,
        }
    }
}

/// Key pattern resolution settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Key prefixes probed in order, each as `<prefix>:<id>`.
    /// The first prefix is also where new records are written.
    pub key_prefixes: Vec<String>,

    /// Probe the bare id as a key after the prefixed candidates.
    pub try_raw_key: bool,

    /// Fall back to a `SCAN MATCH *:<id>` when nothing else hits.
    pub wildcard_enabled: bool,

    /// Maximum number of keys a wildcard scan may return. Listings are
    /// not bounded.
    pub wildcard_scan_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            key_prefixes: vec!["newsletter".to_string(), "article".to_string()],
            try_raw_key: true,
            wildcard_enabled: true,
            wildcard_scan_limit: 500,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 15 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Debug surface configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Mount the `/debug` routes.
    pub enabled: bool,

    /// Bearer token required by `/debug` routes.
    pub api_key: String,

    /// Attach store error details to 500 responses.
    pub expose_errors: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            expose_errors: false,
        }
    }
}

/// The subset of configuration that can change without a restart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuntimeSettings {
    pub resolver: ResolverConfig,
    pub debug: DebugConfig,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            resolver: config.resolver.clone(),
            debug: config.debug.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.resolver.key_prefixes, vec!["newsletter", "article"]);
        assert!(config.resolver.wildcard_enabled);
        assert!(!config.debug.enabled);
    }

    #[test]
    fn test_runtime_settings_snapshot() {
        let mut config = AppConfig::default();
        config.debug.enabled = true;
        config.resolver.try_raw_key = false;

        let settings = RuntimeSettings::from_config(&config);
        assert!(settings.debug.enabled);
        assert!(!settings.resolver.try_raw_key);
    }
}
