//! Refresh subsystem: the single writer of the config store.
//!
//! # Data Flow
//! ```text
//! timer tick | RefreshHandle::trigger | directory change | SIGHUP
//!     → controller.rs (non-reentrant cycle)
//!     → sources (each fetch bounded by a timeout)
//!     → merge (plan order)
//!     → ConfigStore::install
//!     → RefreshEvent broadcast
//! ```
//!
//! # Design Decisions
//! - At most one cycle in flight; concurrent triggers are no-ops
//! - Failures never reach readers; the last good snapshot stays active
//! - Fixed-interval retry after a failure, degradation signal at a threshold

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::RelaySettings;
use crate::merge::MergeError;
use crate::source::SourceError;
use crate::store::StaleSnapshot;

pub mod controller;
pub mod state;

pub use controller::RefreshController;
pub use state::{RefreshState, RefreshStatus};

/// Why a refresh cycle failed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Stale(#[from] StaleSnapshot),
}

impl RefreshError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Source(e) => e.kind(),
            RefreshError::Merge(e) => e.kind(),
            RefreshError::Stale(_) => "stale",
        }
    }
}

/// Result of one call to [`RefreshController::refresh`].
#[derive(Debug)]
pub enum CycleOutcome {
    /// A new snapshot was installed.
    Installed { previous: u64, version: u64 },
    /// Sources were read but nothing changed.
    Unchanged { version: u64 },
    /// The cycle failed; the previous snapshot is still active.
    Failed {
        error: RefreshError,
        consecutive_failures: u32,
    },
    /// Another cycle was already in flight.
    Skipped,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Installed { .. } => "installed",
            CycleOutcome::Unchanged { .. } => "unchanged",
            CycleOutcome::Failed { .. } => "failed",
            CycleOutcome::Skipped => "skipped",
        }
    }
}

/// Notifications published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Installed { previous: u64, version: u64 },
    Failed { consecutive_failures: u32, error: String },
    /// Consecutive failures reached the threshold. Raised once per episode.
    Degraded { consecutive_failures: u32, last_error: String },
    /// First success after a degradation.
    Recovered { version: u64 },
}

/// What asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Manual,
    FileChange,
    Signal,
}

/// Cheap, cloneable way to request a refresh from anywhere.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<RefreshTrigger>,
}

impl RefreshHandle {
    /// Create a handle and the receiver the controller loop consumes.
    pub fn channel() -> (Self, mpsc::Receiver<RefreshTrigger>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Request a refresh. Returns false when one is already pending or the
    /// controller is gone. Safe to call from non-async threads.
    pub fn trigger(&self, reason: RefreshTrigger) -> bool {
        self.tx.try_send(reason).is_ok()
    }
}

/// Timing and thresholds for the controller.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub fetch_timeout: Duration,
    pub retry_interval: Duration,
    pub failure_threshold: u32,
    /// `None` disables timer-driven refreshes.
    pub poll_interval: Option<Duration>,
    pub poll_jitter_ratio: f64,
}

impl RefreshPolicy {
    /// Derive the policy from settings; polls at the shortest non-zero
    /// source interval.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let poll_interval = settings
            .sources
            .iter()
            .map(|s| s.poll_interval_secs)
            .filter(|secs| *secs > 0)
            .min()
            .map(Duration::from_secs);

        Self {
            fetch_timeout: settings.refresh.fetch_timeout(),
            retry_interval: settings.refresh.retry_interval(),
            failure_threshold: settings.refresh.failure_threshold,
            poll_interval,
            poll_jitter_ratio: settings.refresh.poll_jitter_ratio,
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(5),
            failure_threshold: 3,
            poll_interval: None,
            poll_jitter_ratio: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceKind};

    #[test]
    fn test_policy_uses_shortest_poll_interval() {
        let mut a = SourceConfig::new(SourceKind::Directory, "/a");
        a.poll_interval_secs = 0;
        let mut b = SourceConfig::new(SourceKind::Directory, "/b");
        b.poll_interval_secs = 45;
        let mut c = SourceConfig::new(SourceKind::Directory, "/c");
        c.poll_interval_secs = 15;

        let settings = RelaySettings {
            sources: vec![a.clone(), b, c],
            ..RelaySettings::default()
        };
        let policy = RefreshPolicy::from_settings(&settings);
        assert_eq!(policy.poll_interval, Some(Duration::from_secs(15)));
        assert_eq!(policy.fetch_timeout, Duration::from_secs(10));

        let settings = RelaySettings {
            sources: vec![a],
            ..RelaySettings::default()
        };
        assert_eq!(RefreshPolicy::from_settings(&settings).poll_interval, None);
    }

    #[tokio::test]
    async fn test_handle_coalesces_pending_triggers() {
        let (handle, mut rx) = RefreshHandle::channel();
        assert!(handle.trigger(RefreshTrigger::Manual));
        assert!(!handle.trigger(RefreshTrigger::FileChange));
        assert_eq!(rx.recv().await, Some(RefreshTrigger::Manual));

        drop(rx);
        assert!(!handle.trigger(RefreshTrigger::Signal));
    }
}
