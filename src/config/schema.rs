//! Settings schema for the relay itself.
//!
//! These are the static settings read at startup (sources, profiles,
//! refresh policy), not the externalized configuration the relay serves.
//! All types derive Serde traits for deserialization from a TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelaySettings {
    /// Configuration sources, in precedence order (later wins within a profile).
    pub sources: Vec<SourceConfig>,

    /// Active profiles when none are given on the command line.
    pub profiles: Vec<String>,

    /// Refresh cycle policy.
    pub refresh: RefreshSettings,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend kind of a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Versioned git repository.
    Repository,
    /// Locally mounted directory.
    Directory,
    /// Remote HTTP config endpoint.
    Endpoint,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Repository => "repository",
            SourceKind::Directory => "directory",
            SourceKind::Endpoint => "endpoint",
        };
        f.write_str(name)
    }
}

/// One configuration source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Repository URL, directory path or endpoint base URL.
    pub location: String,

    /// Application name; documents are `{name}.{ext}` and `{name}-{profile}.{ext}`.
    #[serde(default = "default_application_name")]
    pub name: String,

    /// Name of the environment variable holding the credential.
    #[serde(default)]
    pub credentials_ref: Option<String>,

    /// Polling interval in seconds (0 = no polling for this source).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Branch to follow (repository), or label path segment (endpoint).
    #[serde(default)]
    pub branch: Option<String>,

    /// Pinned commit or tag (repository). Takes precedence over `branch`.
    #[serde(default)]
    pub revision: Option<String>,

    /// Sub-directories searched in addition to the root, in order.
    #[serde(default)]
    pub search_paths: Vec<String>,

    /// Document extension requested from an endpoint.
    #[serde(default)]
    pub format: Option<String>,
}

fn default_application_name() -> String {
    "application".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

impl SourceConfig {
    /// Minimal source of the given kind with defaults for everything else.
    pub fn new(kind: SourceKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            name: default_application_name(),
            credentials_ref: None,
            poll_interval_secs: default_poll_interval(),
            branch: None,
            revision: None,
            search_paths: Vec::new(),
            format: None,
        }
    }
}

/// Refresh cycle policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Bound on each source fetch attempt, in seconds.
    pub fetch_timeout_secs: u64,

    /// Fixed delay before retrying after a failed cycle, in seconds.
    pub retry_interval_secs: u64,

    /// Consecutive failures before a degradation event is raised.
    pub failure_threshold: u32,

    /// Random extra delay on each poll, as a fraction of the interval.
    pub poll_jitter_ratio: f64,

    /// Trigger a refresh when a watched directory source changes.
    pub watch_directories: bool,

    /// Abort startup if the first refresh fails.
    pub fail_fast: bool,

    /// Where repository mirrors are kept.
    pub cache_dir: String,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 10,
            retry_interval_secs: 5,
            failure_threshold: 3,
            poll_jitter_ratio: 0.0,
            watch_directories: true,
            fail_fast: false,
            cache_dir: ".config-relay/cache".to_string(),
        }
    }
}

impl RefreshSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8888".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
