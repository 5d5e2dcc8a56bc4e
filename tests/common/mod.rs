//! Shared utilities for integration tests.

use std::net::SocketAddr;

use newsletter_reader::config::AppConfig;
use newsletter_reader::http::HttpServer;
use newsletter_reader::lifecycle::Shutdown;
use newsletter_reader::store::{MemoryStore, Store};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const DEBUG_KEY: &str = "test-debug-key";

/// A server bound to a loopback port over an in-memory store.
///
/// Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: MemoryStore,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with debug routes on and errors exposed.
pub fn debug_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.debug.enabled = true;
    config.debug.api_key = DEBUG_KEY.to_string();
    config.debug.expose_errors = true;
    config
}

pub async fn start_server(config: AppConfig, store: MemoryStore) -> TestServer {
    let (server, _) = start_reloadable_server(config, store).await;
    server
}

/// Like [`start_server`], also returning the sender the server takes
/// config reloads from.
pub async fn start_reloadable_server(
    config: AppConfig,
    store: MemoryStore,
) -> (TestServer, mpsc::UnboundedSender<AppConfig>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, Store::from(store.clone()));
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (TestServer { addr, store, shutdown }, updates_tx)
}

/// A store holding one record per storage convention.
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_text(
        "newsletter:fresh",
        r#"{"title":"Fresh","content":"<p>Latest issue</p>","sender":"Weekly","publishDate":"2024-05-02T08:00:00.000Z","tags":["tech"]}"#,
    );
    store.insert_fields(
        "article:legacy",
        [
            ("subject", "Legacy"),
            ("body", "Old body"),
            ("from", "Archive Bot"),
            ("date", "1714550400"),
            ("read", "1"),
        ],
    );
    store.insert_text("rawonly", r#"{"title":"Raw key"}"#);
    store.insert_text("mail:stray", r#"{"title":"Found by scan"}"#);
    store.insert_text(
        "newsletter:old",
        r#"{"title":"Archived","isArchived":true,"publishDate":"2023-01-01T00:00:00Z"}"#,
    );
    store
}
