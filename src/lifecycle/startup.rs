//! Startup orchestration.
//!
//! # Responsibilities
//! - Build source adapters and the merge plan from settings
//! - Run the initial refresh (fatal only with fail_fast)
//! - Spawn the refresh loop and the directory watcher

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::watcher::DirectoryWatcher;
use crate::config::{RelaySettings, SettingsError};
use crate::lifecycle::Shutdown;
use crate::merge::MergePlan;
use crate::refresh::{
    CycleOutcome, RefreshController, RefreshError, RefreshHandle, RefreshPolicy, RefreshTrigger,
};
use crate::source::{build_adapter, SourceAdapter, SourceError};
use crate::store::ConfigStore;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("invalid source: {0}")]
    Source(#[from] SourceError),

    #[error("initial refresh failed: {0}")]
    InitialRefresh(RefreshError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A wired-up relay: store, controller and the trigger channel between them.
pub struct Relay {
    store: Arc<ConfigStore>,
    controller: Arc<RefreshController>,
    handle: RefreshHandle,
    triggers: mpsc::Receiver<RefreshTrigger>,
    watch_directories: bool,
}

impl Relay {
    /// Build a relay from validated settings.
    pub fn build(settings: &RelaySettings, plan: MergePlan) -> Result<Self, StartupError> {
        let sources = settings
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| build_adapter(i, source, &settings.refresh))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_parts(
            sources,
            plan,
            RefreshPolicy::from_settings(settings),
            settings.refresh.watch_directories,
        ))
    }

    /// Build a relay from already constructed adapters.
    pub fn from_parts(
        sources: Vec<Box<dyn SourceAdapter>>,
        plan: MergePlan,
        policy: RefreshPolicy,
        watch_directories: bool,
    ) -> Self {
        let store = Arc::new(ConfigStore::new());
        let controller = Arc::new(RefreshController::new(sources, plan, store.clone(), policy));
        let (handle, triggers) = RefreshHandle::channel();
        Self {
            store,
            controller,
            handle,
            triggers,
            watch_directories,
        }
    }

    pub fn store(&self) -> Arc<ConfigStore> {
        self.store.clone()
    }

    pub fn controller(&self) -> Arc<RefreshController> {
        self.controller.clone()
    }

    pub fn handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    /// Load the first snapshot before anything is served.
    pub async fn initial_refresh(&self, fail_fast: bool) -> Result<(), StartupError> {
        match self.controller.refresh().await {
            CycleOutcome::Failed { error, .. } if fail_fast => {
                Err(StartupError::InitialRefresh(error))
            }
            CycleOutcome::Failed { error, .. } => {
                tracing::warn!(
                    error = %error,
                    "Initial refresh failed; serving empty configuration until a refresh succeeds"
                );
                Ok(())
            }
            outcome => {
                tracing::info!(
                    version = self.store.version(),
                    outcome = outcome.label(),
                    "Initial configuration loaded"
                );
                Ok(())
            }
        }
    }

    /// Spawn the refresh loop, plus a directory watcher when enabled.
    pub fn spawn(self, shutdown: &Shutdown) -> JoinHandle<()> {
        let watcher = if self.watch_directories {
            let paths = self.controller.watch_paths();
            if paths.is_empty() {
                None
            } else {
                match DirectoryWatcher::new(paths, self.handle.clone()).run() {
                    Ok(watcher) => Some(watcher),
                    Err(e) => {
                        tracing::warn!(error = %e, "Directory watcher unavailable; relying on polling");
                        None
                    }
                }
            }
        } else {
            None
        };

        let controller = self.controller;
        let triggers = self.triggers;
        let shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            // Dropping the watcher stops it; keep it for the loop's lifetime.
            let _watcher = watcher;
            controller.run(triggers, shutdown_rx).await;
        })
    }
}
