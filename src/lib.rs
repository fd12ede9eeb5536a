//! Externalized configuration relay library.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod merge;
pub mod observability;
pub mod refresh;
pub mod source;
pub mod store;

pub use config::schema::RelaySettings;
pub use lifecycle::{Relay, Shutdown};
pub use merge::{ConfigValue, MergePlan};
pub use refresh::{CycleOutcome, RefreshController, RefreshHandle};
pub use store::{ConfigSnapshot, ConfigStore};
