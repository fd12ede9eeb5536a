//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check source definitions (locations, URLs, formats)
//! - Validate value ranges (timeouts > 0, ratios in range)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelaySettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::{RelaySettings, SourceKind};
use crate::source::DocumentFormat;

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate profile names supplied outside the settings file (flag or env).
pub fn validate_profiles(profiles: &[String]) -> Result<(), Vec<ValidationError>> {
    let errors = profile_errors(profiles);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Profile names become file stems and URL segments.
fn profile_errors(profiles: &[String]) -> Vec<ValidationError> {
    profiles
        .iter()
        .filter(|p| p.trim().is_empty() || p.contains(&[',', '/', '\\'][..]))
        .map(|p| ValidationError::new("profiles", format!("invalid profile name '{}'", p)))
        .collect()
}

/// Validate settings, collecting every problem found.
pub fn validate_settings(settings: &RelaySettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.sources.is_empty() {
        errors.push(ValidationError::new("sources", "at least one source is required"));
    }

    for (i, source) in settings.sources.iter().enumerate() {
        let field = |name: &str| format!("sources[{}].{}", i, name);

        if source.location.trim().is_empty() {
            errors.push(ValidationError::new(field("location"), "must not be empty"));
        }
        if source.name.trim().is_empty() || source.name.contains(&['/', '\\'][..]) {
            errors.push(ValidationError::new(field("name"), "must be a plain file stem"));
        }
        if let Some(var) = &source.credentials_ref {
            if var.trim().is_empty() {
                errors.push(ValidationError::new(field("credentials_ref"), "must name an environment variable"));
            }
        }

        match source.kind {
            SourceKind::Endpoint => {
                match Url::parse(&source.location) {
                    Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                    Ok(url) => errors.push(ValidationError::new(
                        field("location"),
                        format!("unsupported scheme '{}'", url.scheme()),
                    )),
                    Err(e) => errors.push(ValidationError::new(field("location"), e.to_string())),
                }
                if let Some(format) = &source.format {
                    if DocumentFormat::from_extension(format).is_none() {
                        errors.push(ValidationError::new(
                            field("format"),
                            format!("unknown document format '{}'", format),
                        ));
                    }
                }
            }
            SourceKind::Repository | SourceKind::Directory => {
                if source.format.is_some() {
                    errors.push(ValidationError::new(
                        field("format"),
                        "only endpoint sources take a format; files are detected by extension",
                    ));
                }
            }
        }

        if source.kind != SourceKind::Repository && source.revision.is_some() {
            errors.push(ValidationError::new(field("revision"), "only repository sources can pin a revision"));
        }
        for path in &source.search_paths {
            if path.split(&['/', '\\'][..]).any(|segment| segment == "..") {
                errors.push(ValidationError::new(
                    field("search_paths"),
                    format!("'{}' escapes the source root", path),
                ));
            }
        }
    }

    errors.extend(profile_errors(&settings.profiles));

    let refresh = &settings.refresh;
    if refresh.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("refresh.fetch_timeout_secs", "must be greater than 0"));
    }
    if refresh.retry_interval_secs == 0 {
        errors.push(ValidationError::new("refresh.retry_interval_secs", "must be greater than 0"));
    }
    if refresh.failure_threshold == 0 {
        errors.push(ValidationError::new("refresh.failure_threshold", "must be greater than 0"));
    }
    if !(0.0..1.0).contains(&refresh.poll_jitter_ratio) {
        errors.push(ValidationError::new("refresh.poll_jitter_ratio", "must be in [0, 1)"));
    }
    let needs_cache = settings
        .sources
        .iter()
        .any(|s| s.kind == SourceKind::Repository);
    if needs_cache && refresh.cache_dir.trim().is_empty() {
        errors.push(ValidationError::new("refresh.cache_dir", "required for repository sources"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
