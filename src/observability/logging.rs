//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and to tower-http's request traces.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.to_lowercase();
        EnvFilter::new(format!("newsletter_reader={level},tower_http={level}"))
    })
}

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let json = config.json_logs.then(|| fmt::layer().json());
    let human = (!config.json_logs).then(fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json)
        .with(human)
        .try_init()
}
