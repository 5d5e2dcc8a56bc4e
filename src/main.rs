//! Newsletter reader backend.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser UI / CLI
//!           │
//!           ▼
//!   ┌────────────────┐    ┌─────────────────────┐    ┌────────────────┐
//!   │  http server   │───▶│ newsletter resolver │───▶│     store      │
//!   │ (axum + tower) │    │ keys → probe → norm │    │ redis | memory │
//!   └────────────────┘    └─────────────────────┘    └────────────────┘
//!           │
//!           ├── debug routes (probe reports, key listing)
//!           └── cross-cutting: config reload, tracing, metrics, shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use newsletter_reader::config::loader::apply_env_overrides;
use newsletter_reader::config::validation::validate_config;
use newsletter_reader::config::{load_config, AppConfig, ConfigError, ConfigWatcher};
use newsletter_reader::http::HttpServer;
use newsletter_reader::lifecycle::Shutdown;
use newsletter_reader::observability::{logging, metrics};
use newsletter_reader::store::Store;

#[derive(Parser)]
#[command(name = "newsletter-reader", version, about = "Newsletter reader API server")]
struct Args {
    /// Path to a TOML configuration file. Watched for changes.
    #[arg(short, long, env = "NEWSLETTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config);
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "newsletter-reader starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        prefixes = ?config.resolver.key_prefixes,
        wildcard = config.resolver.wildcard_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Store::from_config(&config.store).await?;

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, store);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
