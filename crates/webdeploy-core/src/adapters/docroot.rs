//! Document-root resolution.

use std::path::{Path, PathBuf};

use crate::fs::ensure_relative_path;

pub trait DocrootResolver: Send + Sync {
    /// Filesystem directory backing `hostname` + `path`, if it exists.
    fn resolve(&self, hostname: &str, path: &str) -> Option<PathBuf>;

    /// User owning `docroot`; scheduled jobs run as this user.
    fn owner(&self, docroot: &Path) -> anyhow::Result<String>;
}

/// Docroots laid out as `<web_root>/<hostname>/<path>`.
#[derive(Debug, Clone)]
pub struct MappedDocrootResolver {
    web_root: PathBuf,
    owner: Option<String>,
}

impl MappedDocrootResolver {
    pub fn new(web_root: PathBuf, owner: Option<String>) -> Self {
        Self { web_root, owner }
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    fn candidate(&self, hostname: &str, path: &str) -> anyhow::Result<PathBuf> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            anyhow::bail!("Hostname must not be empty");
        }
        if hostname.contains('/') || hostname.contains('\\') || hostname.starts_with('.') {
            anyhow::bail!("Invalid hostname: {}", hostname);
        }

        let mut dir = self.web_root.join(hostname.to_ascii_lowercase());
        let subpath = path.trim_matches('/');
        if !subpath.is_empty() {
            let subpath = Path::new(subpath);
            ensure_relative_path(subpath)?;
            dir = dir.join(subpath);
        }
        Ok(dir)
    }
}

impl DocrootResolver for MappedDocrootResolver {
    fn resolve(&self, hostname: &str, path: &str) -> Option<PathBuf> {
        match self.candidate(hostname, path) {
            Ok(dir) if dir.is_dir() => Some(dir),
            Ok(dir) => {
                tracing::debug!(dir = %dir.display(), "docroot does not exist");
                None
            }
            Err(e) => {
                tracing::debug!(hostname, path, error = %e, "docroot rejected");
                None
            }
        }
    }

    fn owner(&self, docroot: &Path) -> anyhow::Result<String> {
        if let Some(owner) = &self.owner {
            return Ok(owner.clone());
        }
        owner_of(docroot)
    }
}

#[cfg(unix)]
fn owner_of(docroot: &Path) -> anyhow::Result<String> {
    use anyhow::Context;
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::metadata(docroot)
        .with_context(|| format!("Failed to read metadata: {}", docroot.display()))?;
    Ok(metadata.uid().to_string())
}

#[cfg(not(unix))]
fn owner_of(docroot: &Path) -> anyhow::Result<String> {
    anyhow::bail!(
        "Cannot determine owner of {}; set sites.owner in the config",
        docroot.display()
    )
}
