//! Lock-free holder of the current snapshot.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::watch;

use crate::store::access::{FromConfigValue, TypeMismatchError};
use crate::store::snapshot::ConfigSnapshot;

/// Callback fired once per newly installed snapshot.
pub type ChangeCallback = Box<dyn Fn(&ConfigSnapshot) + Send + Sync>;

/// Rejected install of a snapshot that does not advance the version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("snapshot version {offered} does not advance current version {current}")]
pub struct StaleSnapshot {
    pub current: u64,
    pub offered: u64,
}

/// Holds the current [`ConfigSnapshot`].
///
/// Reads never lock: [`ConfigStore::current`] is a single atomic load, and a
/// reader keeps whatever `Arc` it got even after newer installs.
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    /// Serializes installs only; readers never touch it.
    install_lock: Mutex<()>,
    callbacks: Mutex<Vec<ChangeCallback>>,
    updates: watch::Sender<Arc<ConfigSnapshot>>,
}

impl ConfigStore {
    /// Create a store serving the empty version-0 snapshot.
    pub fn new() -> Self {
        let initial = Arc::new(ConfigSnapshot::empty());
        let (updates, _) = watch::channel(initial.clone());
        Self {
            current: ArcSwap::new(initial),
            install_lock: Mutex::new(()),
            callbacks: Mutex::new(Vec::new()),
            updates,
        }
    }

    /// Latest installed snapshot.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Typed read from the current snapshot.
    pub fn get<T: FromConfigValue>(&self, key: &str) -> Result<Option<T>, TypeMismatchError> {
        self.current.load().get(key)
    }

    /// Typed read from the current snapshot, with a fallback for absent keys.
    pub fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> Result<T, TypeMismatchError> {
        self.current.load().get_or(key, default)
    }

    /// Atomically replace the current snapshot and notify listeners.
    ///
    /// Returns the snapshot that was replaced.
    pub fn install(&self, snapshot: ConfigSnapshot) -> Result<Arc<ConfigSnapshot>, StaleSnapshot> {
        let _guard = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.current.load_full();
        if snapshot.version() <= previous.version() {
            return Err(StaleSnapshot {
                current: previous.version(),
                offered: snapshot.version(),
            });
        }

        let snapshot = Arc::new(snapshot);
        self.current.store(snapshot.clone());
        self.updates.send_replace(snapshot.clone());

        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            // A failing listener must not undo or block the install.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot))) {
                tracing::error!(
                    version = snapshot.version(),
                    reason = panic_message(payload.as_ref()),
                    "Change callback panicked"
                );
            }
        }

        Ok(previous)
    }

    /// Register a callback fired after every successful install.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigSnapshot) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Receiver that observes every installed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
        self.updates.subscribe()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ConfigMap, ConfigValue};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    fn snapshot(version: u64, value: i64) -> ConfigSnapshot {
        let mut values = ConfigMap::new();
        values.insert("a".into(), ConfigValue::Integer(value));
        values.insert("b".into(), ConfigValue::Integer(value));
        ConfigSnapshot::new(version, vec!["default".into()], Vec::new(), values)
    }

    #[test]
    fn test_starts_with_empty_snapshot() {
        let store = ConfigStore::new();
        assert_eq!(store.version(), 0);
        assert_eq!(store.get::<i64>("a"), Ok(None));
        assert_eq!(store.get_or("a", 9i64), Ok(9));
    }

    #[test]
    fn test_install_swaps_and_keeps_old_readers_consistent() {
        let store = ConfigStore::new();
        store.install(snapshot(1, 10)).unwrap();
        let held = store.current();

        let previous = store.install(snapshot(2, 20)).unwrap();
        assert_eq!(previous.version(), 1);
        assert_eq!(store.get::<i64>("a"), Ok(Some(20)));

        assert_eq!(held.version(), 1);
        assert_eq!(held.get::<i64>("a"), Ok(Some(10)));
    }

    #[test]
    fn test_stale_install_rejected() {
        let store = ConfigStore::new();
        store.install(snapshot(3, 1)).unwrap();
        let err = store.install(snapshot(3, 2)).unwrap_err();
        assert_eq!(err, StaleSnapshot { current: 3, offered: 3 });
        assert_eq!(store.get::<i64>("a"), Ok(Some(1)));
    }

    #[test]
    fn test_on_change_fires_once_per_version() {
        let store = ConfigStore::new();
        let seen = Arc::new(AtomicU64::new(0));
        let calls = Arc::new(AtomicU64::new(0));
        let (s, c) = (seen.clone(), calls.clone());
        store.on_change(move |snap| {
            s.store(snap.version(), Ordering::SeqCst);
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.install(snapshot(1, 1)).unwrap();
        store.install(snapshot(2, 2)).unwrap();
        let _ = store.install(snapshot(2, 3));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_installs() {
        let store = ConfigStore::new();
        let calls = Arc::new(AtomicU64::new(0));
        store.on_change(|snap| panic!("listener rejected version {}", snap.version()));
        let c = calls.clone();
        store.on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.install(snapshot(1, 1)).unwrap();
        store.install(snapshot(2, 2)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get::<i64>("a"), Ok(Some(2)));
    }

    #[test]
    fn test_subscribe_sees_latest() {
        let store = ConfigStore::new();
        let rx = store.subscribe();
        store.install(snapshot(5, 5)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().version(), 5);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_snapshot() {
        let store = Arc::new(ConfigStore::new());
        store.install(snapshot(1, 1)).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        let snap = store.current();
                        let a = snap.get::<i64>("a").unwrap().unwrap();
                        let b = snap.get::<i64>("b").unwrap().unwrap();
                        assert_eq!(a, b);
                        assert_eq!(a as u64, snap.version());
                    }
                })
            })
            .collect();

        for version in 2..=500u64 {
            store.install(snapshot(version, version as i64)).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.version(), 500);
    }
}
