//! Raw documents as fetched from a source, before parsing.

use crate::merge::DEFAULT_PROFILE;

/// Document syntax, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `key=value` lines.
    Properties,
    Toml,
    Yaml,
    Json,
}

/// File extensions probed for each profile, in load order.
pub const CANDIDATES: [(&str, DocumentFormat); 5] = [
    ("properties", DocumentFormat::Properties),
    ("toml", DocumentFormat::Toml),
    ("yml", DocumentFormat::Yaml),
    ("yaml", DocumentFormat::Yaml),
    ("json", DocumentFormat::Json),
];

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "properties" => Some(DocumentFormat::Properties),
            "toml" => Some(DocumentFormat::Toml),
            "yml" | "yaml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    /// True for formats carrying their own value types.
    pub fn is_structured(&self) -> bool {
        !matches!(self, DocumentFormat::Properties)
    }
}

/// File stem for `profile` of application `name`: `app` or `app-prod`.
pub fn document_stem(name: &str, profile: &str) -> String {
    if profile == DEFAULT_PROFILE {
        name.to_string()
    } else {
        format!("{}-{}", name, profile)
    }
}

/// One fetched configuration blob.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Human readable origin, e.g. `directory:/etc/app/application-prod.yml`.
    pub origin: String,
    pub format: DocumentFormat,
    /// Profile this document belongs to.
    pub profile: String,
    /// Position of the producing source in the settings; breaks ties
    /// between documents of the same profile.
    pub source_index: usize,
    pub bytes: Vec<u8>,
}
