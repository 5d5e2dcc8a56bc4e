//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::lifecycle::signals;

/// Broadcast trigger shared by the server and background tasks.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on the first of: a trigger, the trigger being dropped, or an OS
/// termination signal.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    tokio::select! {
        _ = rx.recv() => tracing::info!("Shutdown triggered"),
        _ = signals::terminate() => {}
    }
}
