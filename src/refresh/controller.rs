//! Refresh controller.
//!
//! # Responsibilities
//! - Run fetch → merge → install cycles, one at a time
//! - Bound every source fetch with a timeout
//! - Count failures, raise degradation and recovery events
//! - Schedule the next cycle (poll interval, or retry interval after a failure)

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::Instrument;
use uuid::Uuid;

use crate::merge::{merge, MergePlan};
use crate::observability::metrics;
use crate::refresh::state::{RefreshState, RefreshStatus};
use crate::refresh::{CycleOutcome, RefreshError, RefreshEvent, RefreshPolicy, RefreshTrigger};
use crate::source::{SourceAdapter, SourceError};
use crate::store::ConfigStore;

/// Single writer of a [`ConfigStore`].
pub struct RefreshController {
    sources: Vec<Box<dyn SourceAdapter>>,
    plan: MergePlan,
    store: Arc<ConfigStore>,
    policy: RefreshPolicy,

    state: AtomicU8,
    in_flight: AtomicBool,
    cycles: AtomicU64,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    degraded: AtomicBool,
    last_error: Mutex<Option<String>>,
    events: broadcast::Sender<RefreshEvent>,
}

/// Clears the in-flight flag even if the cycle future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshController {
    pub fn new(
        sources: Vec<Box<dyn SourceAdapter>>,
        plan: MergePlan,
        store: Arc<ConfigStore>,
        policy: RefreshPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sources,
            plan,
            store,
            policy,
            state: AtomicU8::new(RefreshState::Idle as u8),
            in_flight: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
            last_error: Mutex::new(None),
            events,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn plan(&self) -> &MergePlan {
        &self.plan
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from(self.state.load(Ordering::Acquire))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Acquire)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Subscribe to installs, failures, degradation and recovery.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Local directories whose changes should trigger a refresh.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().filter_map(|s| s.watch_path()).collect()
    }

    pub fn status(&self) -> RefreshStatus {
        RefreshStatus {
            state: self.state(),
            version: self.store.version(),
            cycles: self.cycles.load(Ordering::Acquire),
            consecutive_failures: self.consecutive_failures(),
            total_failures: self.total_failures(),
            degraded: self.is_degraded(),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            profiles: self.plan.profiles().to_vec(),
            sources: self.sources.iter().map(|s| s.describe()).collect(),
        }
    }

    /// Run one refresh cycle now.
    ///
    /// Returns [`CycleOutcome::Skipped`] without doing anything if another
    /// cycle is in flight.
    pub async fn refresh(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Refresh already in flight, ignoring trigger");
            metrics::record_cycle(CycleOutcome::Skipped.label());
            return CycleOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);
        self.cycles.fetch_add(1, Ordering::AcqRel);

        let span = tracing::info_span!("refresh_cycle", cycle = %Uuid::new_v4());
        let outcome = async {
            let outcome = match self.run_cycle().await {
                Ok(outcome) => {
                    self.record_success(&outcome);
                    outcome
                }
                Err(error) => self.record_failure(error),
            };
            self.set_state(RefreshState::Idle);
            outcome
        }
        .instrument(span)
        .await;

        metrics::record_cycle(outcome.label());
        outcome
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, RefreshError> {
        self.set_state(RefreshState::Fetching);
        let started = Instant::now();

        let mut documents = Vec::new();
        for source in &self.sources {
            let fetched = time::timeout(self.policy.fetch_timeout, source.fetch(&self.plan))
                .await
                .map_err(|_| SourceError::Timeout {
                    location: source.describe(),
                    timeout: self.policy.fetch_timeout,
                })??;
            documents.extend(fetched);
        }
        metrics::record_fetch_duration(started.elapsed());

        self.set_state(RefreshState::Merging);
        let current = self.store.current();
        let snapshot = merge(documents, &self.plan, current.version() + 1)?;

        if current.version() > 0 && snapshot.same_content(&current) {
            tracing::debug!(version = current.version(), "Configuration unchanged");
            return Ok(CycleOutcome::Unchanged {
                version: current.version(),
            });
        }

        self.set_state(RefreshState::Installing);
        let version = snapshot.version();
        let previous = self.store.install(snapshot)?;

        Ok(CycleOutcome::Installed {
            previous: previous.version(),
            version,
        })
    }

    fn record_success(&self, outcome: &CycleOutcome) {
        let version = match outcome {
            CycleOutcome::Installed { previous, version } => {
                tracing::info!(
                    from = previous,
                    to = version,
                    "Configuration updated: version {} -> {}",
                    previous,
                    version
                );
                metrics::record_snapshot_version(*version);
                let _ = self.events.send(RefreshEvent::Installed {
                    previous: *previous,
                    version: *version,
                });
                *version
            }
            CycleOutcome::Unchanged { version } => *version,
            _ => return,
        };

        self.consecutive_failures.store(0, Ordering::Release);
        metrics::record_consecutive_failures(0);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;

        if self.degraded.swap(false, Ordering::AcqRel) {
            tracing::info!(version, "Refresh recovered from persistent failure");
            let _ = self.events.send(RefreshEvent::Recovered { version });
        }
    }

    fn record_failure(&self, error: RefreshError) -> CycleOutcome {
        self.set_state(RefreshState::Failed);

        let consecutive = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        self.total_failures.fetch_add(1, Ordering::AcqRel);
        let message = error.to_string();
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.clone());

        tracing::warn!(
            error = %message,
            kind = error.kind(),
            consecutive_failures = consecutive,
            version = self.store.version(),
            "Refresh failed, keeping current configuration"
        );
        metrics::record_refresh_failure(error.kind());
        metrics::record_consecutive_failures(consecutive);

        let _ = self.events.send(RefreshEvent::Failed {
            consecutive_failures: consecutive,
            error: message.clone(),
        });

        if consecutive >= self.policy.failure_threshold && !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::error!(
                consecutive_failures = consecutive,
                error = %message,
                "Configuration refresh persistently failing; serving last good snapshot"
            );
            let _ = self.events.send(RefreshEvent::Degraded {
                consecutive_failures: consecutive,
                last_error: message,
            });
        }

        CycleOutcome::Failed {
            error,
            consecutive_failures: consecutive,
        }
    }

    fn set_state(&self, state: RefreshState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Delay before the next timer-driven cycle; `None` waits for triggers only.
    fn next_delay(&self) -> Option<Duration> {
        if self.consecutive_failures() > 0 {
            return Some(self.policy.retry_interval);
        }
        self.policy.poll_interval.map(|base| {
            let ratio = self.policy.poll_jitter_ratio;
            if ratio > 0.0 {
                base + base.mul_f64(ratio * fastrand::f64())
            } else {
                base
            }
        })
    }

    /// Run the refresh loop until shutdown.
    pub async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<RefreshTrigger>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            poll_interval = ?self.policy.poll_interval,
            retry_interval = ?self.policy.retry_interval,
            sources = self.sources.len(),
            "Refresh controller starting"
        );

        let mut triggers_open = true;
        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = sleep_or_wait(delay) => {
                    tracing::debug!("Refresh timer fired");
                }
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(reason) => tracing::debug!(?reason, "Refresh triggered"),
                    None => {
                        triggers_open = false;
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Refresh controller received shutdown signal, exiting loop");
                    break;
                }
            }

            self.refresh().await;

            // Triggers that arrived mid-cycle were covered by it.
            while triggers.try_recv().is_ok() {}
        }
    }
}

async fn sleep_or_wait(delay: Option<Duration>) {
    match delay {
        Some(delay) => time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}
