//! Relay settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelaySettings (validated, immutable)
//!     → startup builds sources, plan and refresh policy from it
//!
//! While running:
//!     watcher.rs detects changes in directory sources
//!     → RefreshHandle::trigger
//!     → refresh controller re-fetches and re-merges
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; they are not hot-reloaded
//! - All fields have defaults to allow minimal settings files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_settings, parse_settings, SettingsError};
pub use schema::{
    AdminConfig, ObservabilityConfig, RefreshSettings, RelaySettings, SourceConfig, SourceKind,
};
pub use validation::{validate_profiles, ValidationError};
