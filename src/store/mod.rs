//! Config store: the current snapshot and typed access to it.
//!
//! # Data Flow
//! ```text
//! refresh controller (single writer)
//!     → ConfigStore::install (atomic Arc swap, version must advance)
//!     → on_change callbacks + watch subscribers
//!
//! consumers (any number, any thread)
//!     → ConfigStore::current / get (lock-free load)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; an install replaces the whole reference
//! - Readers holding an older `Arc` keep a consistent view
//! - Coercion happens only at the `get` boundary

pub mod access;
pub mod config_store;
pub mod snapshot;

pub use access::{FromConfigValue, TypeMismatchError};
pub use config_store::{ChangeCallback, ConfigStore, StaleSnapshot};
pub use snapshot::ConfigSnapshot;
