//! Source adapters: where configuration documents come from.
//!
//! # Data Flow
//! ```text
//! SourceConfig (kind, location, credentials_ref, ...)
//!     → build_adapter
//!     → directory.rs | repository.rs | endpoint.rs
//!     → fetch(plan) → Vec<RawDocument>
//! ```
//!
//! # Design Decisions
//! - One document per (profile, file) found; an absent profile is not an error
//! - Credentials are read from the environment at fetch time, never logged
//! - Timeouts are enforced by the caller around each fetch attempt

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{RefreshSettings, SourceConfig, SourceKind};
use crate::merge::MergePlan;

pub mod directory;
pub mod document;
pub mod endpoint;
pub mod repository;

pub use directory::DirectorySource;
pub use document::{document_stem, DocumentFormat, RawDocument, CANDIDATES};
pub use endpoint::EndpointSource;
pub use repository::RepositorySource;

/// Error raised while fetching from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or IO failure.
    #[error("fetch from {location} failed: {message}")]
    Fetch { location: String, message: String },

    /// The fetch attempt exceeded its time bound.
    #[error("fetch from {location} timed out after {}ms", .timeout.as_millis())]
    Timeout { location: String, timeout: Duration },

    /// The source rejected (or we lack) the credentials.
    #[error("credentials rejected by {location}: {message}")]
    Auth { location: String, message: String },
}

impl SourceError {
    pub(crate) fn fetch(location: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Fetch {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn auth(location: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Auth {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch { .. } => "fetch",
            SourceError::Timeout { .. } => "timeout",
            SourceError::Auth { .. } => "auth",
        }
    }
}

/// A backend that yields raw configuration documents.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch the documents of every profile in `plan`.
    async fn fetch(&self, plan: &MergePlan) -> Result<Vec<RawDocument>, SourceError>;

    /// Human readable identity for logs, e.g. `directory:/etc/app`.
    fn describe(&self) -> String;

    /// Local directory whose changes should trigger a refresh.
    fn watch_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Build the adapter for the source at position `index` of the settings.
pub fn build_adapter(
    index: usize,
    config: &SourceConfig,
    refresh: &RefreshSettings,
) -> Result<Box<dyn SourceAdapter>, SourceError> {
    Ok(match config.kind {
        SourceKind::Directory => Box::new(DirectorySource::new(index, config)),
        SourceKind::Repository => Box::new(RepositorySource::new(index, config, refresh)),
        SourceKind::Endpoint => Box::new(EndpointSource::new(index, config, refresh)?),
    })
}

/// Read the credential named by `credentials_ref` from the environment.
pub(crate) fn resolve_credential(
    location: &str,
    credentials_ref: Option<&str>,
) -> Result<Option<String>, SourceError> {
    match credentials_ref {
        None => Ok(None),
        Some(var) => std::env::var(var)
            .map(Some)
            .map_err(|_| SourceError::auth(location, format!("credential variable {} is not set", var))),
    }
}

/// Directories to search relative to a source root; the root itself first.
pub(crate) fn search_dirs(search_paths: &[String]) -> Vec<String> {
    let mut dirs = vec![String::new()];
    for path in search_paths {
        let path = path.trim().trim_matches('/');
        if !path.is_empty() && !dirs.iter().any(|d| d == path) {
            dirs.push(path.to_string());
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_dirs() {
        let dirs = search_dirs(&["/billing/".into(), "".into(), "billing".into(), "shared".into()]);
        assert_eq!(dirs, ["", "billing", "shared"]);
    }

    #[test]
    fn test_missing_credential_is_auth_error() {
        let err = resolve_credential("endpoint:x", Some("CONFIG_RELAY_TEST_UNSET_VAR")).unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(resolve_credential("endpoint:x", None).unwrap().is_none());
    }
}
