//! Merge failures.

use thiserror::Error;

use crate::merge::value::ValueKind;

/// Error raised while turning fetched documents into a snapshot.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A document could not be parsed.
    #[error("failed to parse {document}: {message}")]
    Parse { document: String, message: String },

    /// A later profile changed the basic type of an existing key.
    #[error("profile '{profile}' changes '{key}' from {existing} to {incoming}")]
    Conflict {
        key: String,
        profile: String,
        existing: ValueKind,
        incoming: ValueKind,
    },
}

impl MergeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::Parse { .. } => "parse",
            MergeError::Conflict { .. } => "conflict",
        }
    }
}
