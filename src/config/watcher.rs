//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! and deploy tools that replace the file by rename are still seen.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// Forwards every valid reload of one configuration file.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path);
        let file_name = self.path.file_name().map(OsString::from);
        let path = self.path;
        let tx = self.update_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, file_name.as_ref()) => reload(&path, &tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A create or modify event naming the watched file.
fn touches(event: &Event, file_name: Option<&OsString>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().map(OsString::from).as_ref() == file_name)
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<AppConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = ?path, "Config file changed, reloading");
            let _ = tx.send(config);
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected config reload, keeping current configuration");
        }
    }
}
