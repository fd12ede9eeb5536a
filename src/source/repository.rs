//! Versioned git repository source.
//!
//! # Responsibilities
//! - Keep a local mirror of the remote repository (clone once, fetch after)
//! - Resolve a pinned revision, or the latest commit of a branch
//! - Read documents straight from that commit's tree (no checkout)
//!
//! # Design Decisions
//! - Drives the `git` executable; the mirror lives under `refresh.cache_dir`
//! - Child processes are killed when a fetch is cancelled by its timeout
//! - Credentials travel as an extra HTTP header, never on the URL

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{RefreshSettings, SourceConfig};
use crate::merge::MergePlan;
use crate::source::{
    document_stem, resolve_credential, search_dirs, RawDocument, SourceAdapter, SourceError,
    CANDIDATES,
};

const DEFAULT_BRANCH: &str = "main";

// git stderr fragments that mean the remote refused our credentials.
const AUTH_MARKERS: [&str; 6] = [
    "Authentication failed",
    "could not read Username",
    "terminal prompts disabled",
    "Permission denied (publickey)",
    "returned error: 401",
    "returned error: 403",
];

/// Reads documents from a git repository.
#[derive(Debug, Clone)]
pub struct RepositorySource {
    index: usize,
    name: String,
    url: String,
    branch: String,
    revision: Option<String>,
    search_paths: Vec<String>,
    mirror_dir: PathBuf,
    credentials_ref: Option<String>,
}

impl RepositorySource {
    pub fn new(index: usize, config: &SourceConfig, refresh: &RefreshSettings) -> Self {
        Self {
            index,
            name: config.name.clone(),
            url: config.location.clone(),
            branch: config
                .branch
                .clone()
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            revision: config.revision.clone(),
            search_paths: config.search_paths.clone(),
            mirror_dir: PathBuf::from(&refresh.cache_dir).join(mirror_name(&config.location)),
            credentials_ref: config.credentials_ref.clone(),
        }
    }

    /// Run git and return its stdout.
    async fn git(&self, credential: Option<&str>, args: &[&str]) -> Result<Vec<u8>, SourceError> {
        let output = git_command(credential, args)
            .output()
            .await
            .map_err(|e| SourceError::fetch(self.describe(), format!("failed to run git: {}", e)))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("git exited with an error")
            .trim()
            .to_string();

        if AUTH_MARKERS.iter().any(|marker| stderr.contains(marker)) {
            Err(SourceError::auth(self.describe(), message))
        } else {
            Err(SourceError::fetch(self.describe(), message))
        }
    }

    /// Clone the mirror on first use, otherwise fetch into it.
    async fn sync_mirror(&self, credential: Option<&str>) -> Result<(), SourceError> {
        let mirror = self.mirror_dir.to_string_lossy().into_owned();

        if tokio::fs::metadata(self.mirror_dir.join("HEAD")).await.is_ok() {
            self.git(
                credential,
                &["--git-dir", mirror.as_str(), "fetch", "--quiet", "--prune", "origin"],
            )
            .await?;
            return Ok(());
        }

        // A clone cancelled half-way leaves a directory git refuses to reuse.
        if tokio::fs::metadata(&self.mirror_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&self.mirror_dir)
                .await
                .map_err(|e| SourceError::fetch(self.describe(), e))?;
        }
        if let Some(parent) = self.mirror_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SourceError::fetch(self.describe(), e))?;
        }

        tracing::info!(source = %self.describe(), mirror = %mirror, "Cloning config repository");
        self.git(
            credential,
            &["clone", "--mirror", "--quiet", self.url.as_str(), mirror.as_str()],
        )
        .await?;
        Ok(())
    }

    /// Commit id of the pinned revision, or of the branch head.
    async fn resolve_commit(&self) -> Result<String, SourceError> {
        let mirror = self.mirror_dir.to_string_lossy().into_owned();
        let rev = match &self.revision {
            Some(revision) => revision.clone(),
            None => format!("refs/heads/{}", self.branch),
        };
        let target = format!("{}^{{commit}}", rev);

        let out = self
            .git(
                None,
                &["--git-dir", mirror.as_str(), "rev-parse", "--verify", "--quiet", target.as_str()],
            )
            .await
            .map_err(|_| SourceError::fetch(self.describe(), format!("unknown revision '{}'", rev)))?;

        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }
}

#[async_trait]
impl SourceAdapter for RepositorySource {
    async fn fetch(&self, plan: &MergePlan) -> Result<Vec<RawDocument>, SourceError> {
        let credential = resolve_credential(&self.describe(), self.credentials_ref.as_deref())?;
        self.sync_mirror(credential.as_deref()).await?;

        let commit = self.resolve_commit().await?;
        let mirror = self.mirror_dir.to_string_lossy().into_owned();

        let listing = self
            .git(
                None,
                &["--git-dir", mirror.as_str(), "ls-tree", "-r", "--name-only", commit.as_str()],
            )
            .await?;
        let files: HashSet<String> = String::from_utf8_lossy(&listing)
            .lines()
            .map(str::to_string)
            .collect();

        let short = &commit[..commit.len().min(12)];
        let mut documents = Vec::new();

        for profile in plan.profiles() {
            let stem = document_stem(&self.name, profile);
            for dir in search_dirs(&self.search_paths) {
                for (ext, format) in CANDIDATES {
                    let file = format!("{}.{}", stem, ext);
                    let path = if dir.is_empty() { file } else { format!("{}/{}", dir, file) };
                    if !files.contains(&path) {
                        continue;
                    }

                    let object = format!("{}:{}", commit, path);
                    let bytes = self
                        .git(None, &["--git-dir", mirror.as_str(), "show", object.as_str()])
                        .await?;

                    documents.push(RawDocument {
                        origin: format!("repository:{}@{}:{}", self.url, short, path),
                        format,
                        profile: profile.clone(),
                        source_index: self.index,
                        bytes,
                    });
                }
            }
        }

        tracing::debug!(
            source = %self.describe(),
            commit = %short,
            documents = documents.len(),
            "Repository fetched"
        );
        Ok(documents)
    }

    fn describe(&self) -> String {
        match &self.revision {
            Some(revision) => format!("repository:{}@{}", self.url, revision),
            None => format!("repository:{}#{}", self.url, self.branch),
        }
    }
}

/// Build a git invocation. The credential goes in git's environment config,
/// never in the argument list.
fn git_command(credential: Option<&str>, args: &[&str]) -> Command {
    let mut command = Command::new("git");
    command
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(token) = credential {
        command
            .env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "http.extraHeader")
            .env("GIT_CONFIG_VALUE_0", format!("Authorization: Bearer {}", token));
    }
    command.args(args);
    command
}

/// Directory name for the mirror of `url`.
fn mirror_name(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
