//! Cache services backing the release catalog.
//!
//! The catalog only relies on get/set/invalidate by key; entries never
//! expire on their own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::types::ReleaseMap;

pub trait VersionCache: Send + Sync {
    /// Cached snapshot for `key`, or `None` when absent.
    fn get(&self, key: &str) -> Option<ReleaseMap>;

    fn set(&self, key: &str, releases: &ReleaseMap) -> anyhow::Result<()>;

    fn invalidate(&self, key: &str) -> anyhow::Result<()>;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, ReleaseMap>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionCache for MemoryCache {
    fn get(&self, key: &str) -> Option<ReleaseMap> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, releases: &ReleaseMap) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), releases.clone());
        Ok(())
    }

    fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// JSON files under a cache directory, shared by every process on the host.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl VersionCache for FileCache {
    fn get(&self, key: &str) -> Option<ReleaseMap> {
        let path = self.entry_path(key);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(releases) => Some(releases),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, releases: &ReleaseMap) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;
        let path = self.entry_path(key);
        let content =
            serde_json::to_string_pretty(releases).context("Failed to serialize release cache")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))
    }

    fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove cache entry: {}", path.display())),
        }
    }
}
