//! Installed-version detection.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::catalog::{ReleaseCatalog, compare_versions};
use crate::orchestration::Collaborators;
use crate::recipe::AppRecipe;

pub struct VersionProbe {
    collaborators: Collaborators,
    catalog: ReleaseCatalog,
    recipe: AppRecipe,
}

impl std::fmt::Debug for VersionProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionProbe")
            .field("recipe", &self.recipe.name)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl VersionProbe {
    pub fn new(collaborators: Collaborators, catalog: ReleaseCatalog, recipe: AppRecipe) -> Self {
        Self {
            collaborators,
            catalog,
            recipe,
        }
    }

    /// Version installed at `hostname`/`path`, if any.
    ///
    /// Reads the first token of the version marker. An empty marker falls
    /// back to the lifecycle's own probe.
    pub fn get_version(&self, hostname: &str, path: &str) -> anyhow::Result<Option<String>> {
        let Some(docroot) = self.collaborators.docroots.resolve(hostname, path) else {
            return Ok(None);
        };

        let marker = docroot.join(self.recipe.version_marker);
        if !marker.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&marker)
            .with_context(|| format!("Failed to read version marker: {}", marker.display()))?;

        match content.split_whitespace().next() {
            Some(version) => Ok(Some(version.to_string())),
            None => {
                tracing::debug!(marker = %marker.display(), "empty version marker, using recorded version");
                self.collaborators.lifecycle.detect_version(&docroot)
            }
        }
    }

    /// Whether a valid installation exists. `hostname` may also be an
    /// absolute filesystem path to the docroot.
    pub fn is_installed(&self, hostname: &str, path: &str) -> bool {
        let docroot = if Path::new(hostname).is_absolute() {
            let mut docroot = PathBuf::from(hostname);
            let path = path.trim_matches('/');
            if !path.is_empty() {
                docroot.push(path);
            }
            Some(docroot)
        } else {
            self.collaborators.docroots.resolve(hostname, path)
        };

        docroot.is_some_and(|docroot| docroot.join(self.recipe.install_marker).is_file())
    }

    /// Versions the release catalog knows about, oldest first.
    pub fn list_versions(&self) -> Vec<String> {
        self.catalog.list_versions()
    }

    /// Newest catalog version strictly newer than the installed one.
    pub fn upgrade_available(&self, hostname: &str, path: &str) -> anyhow::Result<Option<String>> {
        let Some(installed) = self.get_version(hostname, path)? else {
            return Ok(None);
        };
        Ok(self
            .catalog
            .latest()
            .filter(|latest| compare_versions(latest, &installed) == Ordering::Greater))
    }
}
