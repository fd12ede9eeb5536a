//! Locally mounted directory source.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::merge::MergePlan;
use crate::source::{
    document_stem, search_dirs, RawDocument, SourceAdapter, SourceError, CANDIDATES,
};

/// Reads `{name}[-{profile}].{ext}` files from a directory tree.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    index: usize,
    name: String,
    root: PathBuf,
    search_paths: Vec<String>,
}

impl DirectorySource {
    pub fn new(index: usize, config: &SourceConfig) -> Self {
        Self {
            index,
            name: config.name.clone(),
            root: PathBuf::from(&config.location),
            search_paths: config.search_paths.clone(),
        }
    }
}

#[async_trait]
impl SourceAdapter for DirectorySource {
    async fn fetch(&self, plan: &MergePlan) -> Result<Vec<RawDocument>, SourceError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(SourceError::fetch(self.describe(), "not a directory")),
            Err(e) => return Err(SourceError::fetch(self.describe(), e)),
        }

        let mut documents = Vec::new();
        for profile in plan.profiles() {
            let stem = document_stem(&self.name, profile);
            for dir in search_dirs(&self.search_paths) {
                let base = if dir.is_empty() { self.root.clone() } else { self.root.join(&dir) };
                for (ext, format) in CANDIDATES {
                    let path = base.join(format!("{}.{}", stem, ext));
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => documents.push(RawDocument {
                            origin: format!("directory:{}", path.display()),
                            format,
                            profile: profile.clone(),
                            source_index: self.index,
                            bytes,
                        }),
                        // Absent file: this profile has nothing here.
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => {
                            return Err(SourceError::fetch(
                                self.describe(),
                                format!("{}: {}", path.display(), e),
                            ))
                        }
                    }
                }
            }
        }

        tracing::debug!(source = %self.describe(), documents = documents.len(), "Directory fetched");
        Ok(documents)
    }

    fn describe(&self) -> String {
        format!("directory:{}", self.root.display())
    }

    fn watch_path(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }
}
