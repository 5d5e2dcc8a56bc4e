//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + NEWSLETTER_* environment
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps RuntimeSettings (resolver + debug sections)
//! ```
//!
//! Listener and store settings only take effect on restart.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, DebugConfig, ListenerConfig, ObservabilityConfig, ResolverConfig, RuntimeSettings,
    StoreBackend, StoreConfig, TimeoutConfig,
};
pub use watcher::ConfigWatcher;
