//! Directory watcher that turns file changes into refresh triggers.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::refresh::{RefreshHandle, RefreshTrigger};

/// Watches directory sources and requests a refresh when they change.
pub struct DirectoryWatcher {
    paths: Vec<PathBuf>,
    handle: RefreshHandle,
}

impl DirectoryWatcher {
    pub fn new(paths: Vec<PathBuf>, handle: RefreshHandle) -> Self {
        Self { paths, handle }
    }

    /// Start watching in notify's background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let handle = self.handle.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::debug!(paths = ?event.paths, "Config directory change detected");
                        handle.trigger(RefreshTrigger::FileChange);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
            tracing::info!(path = ?path, "Config directory watcher started");
        }
        Ok(watcher)
    }
}
