//! Installation metadata persistence.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::fs::docroot_key;
use crate::types::InstallMeta;

pub trait MetadataStore: Send + Sync {
    fn write(&self, docroot: &Path, meta: &InstallMeta) -> anyhow::Result<()>;

    fn read(&self, docroot: &Path) -> anyhow::Result<Option<InstallMeta>>;

    /// Returns `false` when no record existed.
    fn remove(&self, docroot: &Path) -> anyhow::Result<bool>;
}

/// One TOML record per docroot under `<state>/meta`.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    dir: PathBuf,
}

impl FileMetadataStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn record_path(&self, docroot: &Path) -> PathBuf {
        self.dir.join(format!("{}.toml", docroot_key(docroot)))
    }
}

impl MetadataStore for FileMetadataStore {
    fn write(&self, docroot: &Path, meta: &InstallMeta) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create metadata directory: {}", self.dir.display()))?;
        let path = self.record_path(docroot);
        let content = toml::to_string_pretty(meta).context("Failed to serialize install metadata")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write install metadata: {}", path.display()))
    }

    fn read(&self, docroot: &Path) -> anyhow::Result<Option<InstallMeta>> {
        let path = self.record_path(docroot);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read install metadata: {}", path.display()))?;
        let meta = toml::from_str(&content)
            .with_context(|| format!("Failed to parse install metadata: {}", path.display()))?;
        Ok(Some(meta))
    }

    fn remove(&self, docroot: &Path) -> anyhow::Result<bool> {
        crate::fs::remove_path_if_exists(&self.record_path(docroot))
    }
}
