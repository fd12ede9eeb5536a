//! Parsing and profile-ordered merging.
//!
//! # Data Flow
//! ```text
//! RawDocument (bytes + format + profile)
//!     → parser.rs (format specific → ConfigMap)
//!     → merger.rs (apply in MergePlan order, later wins)
//!     → ConfigSnapshot (immutable, versioned)
//! ```
//!
//! # Design Decisions
//! - Values are a tagged union; typing happens once, at parse time
//! - Nested maps merge recursively, scalars and lists are replaced
//! - A later profile may not change a key's basic type

pub mod error;
pub mod merger;
pub mod parser;
pub mod plan;
pub mod value;

pub use error::MergeError;
pub use merger::merge;
pub use plan::{MergePlan, DEFAULT_PROFILE};
pub use value::{ConfigMap, ConfigValue, ValueKind};
