//! Hot reload of the config file.
//!
//! Every write or create event on the file triggers a full
//! [`load_config`], so a reload goes through the same environment
//! overrides and validation as startup. Invalid files are logged and
//! dropped; the running policy stays in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Poll interval for backends without native notifications.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one config file and publishes validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    handle_event(&watched, &event.kind, &update_tx);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Reload on content changes. Returns whether a new config was published.
pub fn handle_event(path: &Path, kind: &EventKind, tx: &mpsc::UnboundedSender<GateConfig>) -> bool {
    if !(kind.is_modify() || kind.is_create()) {
        return false;
    }

    tracing::info!(path = %path.display(), "Config file changed, reloading");
    match load_config(path) {
        Ok(config) => tx.send(config).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Config reload rejected. Keeping current configuration.");
            false
        }
    }
}
