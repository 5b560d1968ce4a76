//! Filesystem permission profiles ("fortification").
//!
//! Applying a profile removes group/other write access from the whole
//! docroot, then grants group write back to the profile's paths. The web
//! server typically runs under a different uid than the account, so only
//! the listed paths stay writable for it.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::fs::docroot_key;
use crate::types::AclProfile;

pub trait AclEnforcer: Send + Sync {
    /// Apply `profile`, leaving only `writable` (relative to `docroot`) writable.
    fn apply(&self, docroot: &Path, profile: AclProfile, writable: &[&str]) -> anyhow::Result<()>;

    /// Last profile applied to `docroot`.
    fn current(&self, docroot: &Path) -> anyhow::Result<Option<AclProfile>>;
}

/// Unix permission-bit enforcer; records applied profiles in the state dir.
#[derive(Debug, Clone)]
pub struct FsAclEnforcer {
    state_dir: PathBuf,
}

impl FsAclEnforcer {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    fn record_path(&self, docroot: &Path) -> PathBuf {
        self.state_dir
            .join("acl")
            .join(format!("{}.profile", docroot_key(docroot)))
    }
}

impl AclEnforcer for FsAclEnforcer {
    fn apply(&self, docroot: &Path, profile: AclProfile, writable: &[&str]) -> anyhow::Result<()> {
        if !docroot.is_dir() {
            anyhow::bail!("Docroot does not exist: {}", docroot.display());
        }

        restrict_tree(docroot)?;
        let mut granted = 0;
        for relative in writable {
            crate::fs::ensure_relative_path(Path::new(relative))?;
            let target = docroot.join(relative);
            if target.exists() {
                grant_tree(&target)?;
                granted += 1;
            }
        }

        let record = self.record_path(docroot);
        if let Some(parent) = record.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&record, profile.as_str())
            .with_context(|| format!("Failed to record ACL profile: {}", record.display()))?;

        tracing::info!(
            docroot = %docroot.display(),
            profile = %profile,
            granted,
            "ACL profile applied"
        );
        Ok(())
    }

    fn current(&self, docroot: &Path) -> anyhow::Result<Option<AclProfile>> {
        let record = self.record_path(docroot);
        if !record.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&record)
            .with_context(|| format!("Failed to read ACL record: {}", record.display()))?;
        content.trim().parse().map(Some)
    }
}

#[cfg(unix)]
fn restrict_tree(path: &Path) -> anyhow::Result<()> {
    update_mode_recursive(path, &|mode| mode & !0o022)
}

#[cfg(unix)]
fn grant_tree(path: &Path) -> anyhow::Result<()> {
    update_mode_recursive(path, &|mode| mode | 0o020)
}

#[cfg(unix)]
fn update_mode_recursive(path: &Path, update: &dyn Fn(u32) -> u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mode = metadata.permissions().mode();
    let next = update(mode);
    if next != mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(next))
            .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
    }

    if metadata.is_dir() {
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {}", path.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read directory entry: {}", path.display()))?;
            update_mode_recursive(&entry.path(), update)?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_tree(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn grant_tree(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
