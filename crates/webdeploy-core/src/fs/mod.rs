//! Filesystem primitives shared across adapters.

use std::path::{Component, Path};

use anyhow::Context;

/// Remove a path (file or directory) if it exists.
///
/// Returns `Ok(true)` if something was removed, `Ok(false)` if path didn't exist.
pub fn remove_path_if_exists(path: &Path) -> anyhow::Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read metadata: {}", path.display()));
        }
    };
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    } else {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(true)
}

/// Remove everything inside `dir`, keeping `dir` itself.
///
/// Returns the number of top-level entries removed.
pub fn clear_dir_contents(dir: &Path) -> anyhow::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut removed = 0;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read directory entry: {}", dir.display()))?;
        if remove_path_if_exists(&entry.path())? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Stable file-name key for state kept per docroot.
pub fn docroot_key(docroot: &Path) -> String {
    let hash = blake3::hash(docroot.to_string_lossy().as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Reject absolute paths and `..` components.
pub fn ensure_relative_path(path: &Path) -> anyhow::Result<()> {
    for component in path.components() {
        match component {
            Component::ParentDir => {
                anyhow::bail!("Path traversal is not allowed: {}", path.display());
            }
            Component::Prefix(_) | Component::RootDir => {
                anyhow::bail!("Absolute paths are not allowed: {}", path.display());
            }
            _ => {}
        }
    }
    Ok(())
}
