//! Settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelaySettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<RelaySettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    parse_settings(&content)
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<RelaySettings, SettingsError> {
    let settings: RelaySettings = toml::from_str(content)?;
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SourceKind;

    #[test]
    fn test_parse_full_settings() {
        let settings = parse_settings(
            r#"
            profiles = ["prod"]

            [[sources]]
            kind = "directory"
            location = "/etc/billing"
            name = "billing"
            poll_interval_secs = 0

            [[sources]]
            kind = "repository"
            location = "https://git.example.com/config.git"
            branch = "release"
            credentials_ref = "CONFIG_REPO_TOKEN"
            search_paths = ["billing"]

            [refresh]
            fetch_timeout_secs = 3
            failure_threshold = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.profiles, ["prod"]);
        assert_eq!(settings.sources.len(), 2);
        assert_eq!(settings.sources[0].kind, SourceKind::Directory);
        assert_eq!(settings.sources[0].poll_interval_secs, 0);
        assert_eq!(settings.sources[1].name, "application");
        assert_eq!(settings.sources[1].poll_interval_secs, 30);
        assert_eq!(settings.sources[1].credentials_ref.as_deref(), Some("CONFIG_REPO_TOKEN"));
        assert_eq!(settings.refresh.fetch_timeout_secs, 3);
        assert_eq!(settings.refresh.retry_interval_secs, 5);
        assert!(settings.admin.enabled);
    }

    #[test]
    fn test_rejects_unknown_kind_and_invalid_values() {
        let err = parse_settings("[[sources]]\nkind = \"s3\"\nlocation = \"x\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));

        let err = parse_settings("[refresh]\nretry_interval_secs = 0\n").unwrap_err();
        match err {
            SettingsError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_settings(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
