//! Uninstall workflow: drop the scheduled job, then run the generic sweep.

use std::path::PathBuf;

use anyhow::Context;

use crate::error::{DeployError, chain_message};
use crate::orchestration::Collaborators;
use crate::recipe::AppRecipe;
use crate::types::DeleteScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub docroot: PathBuf,
    pub scope: DeleteScope,
    /// `false` when no matching job was scheduled.
    pub job_removed: bool,
    pub warnings: Vec<String>,
}

pub struct UninstallOrchestrator {
    collaborators: Collaborators,
    recipe: AppRecipe,
}

impl std::fmt::Debug for UninstallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UninstallOrchestrator")
            .field("recipe", &self.recipe.name)
            .finish_non_exhaustive()
    }
}

impl UninstallOrchestrator {
    pub fn new(collaborators: Collaborators, recipe: AppRecipe) -> Self {
        Self {
            collaborators,
            recipe,
        }
    }

    /// Remove the installation at `hostname`/`path`.
    ///
    /// A missing docroot fails with [`DeployError::Precondition`], which
    /// callers can recover with `downcast_ref`.
    pub fn uninstall(
        &self,
        hostname: &str,
        path: &str,
        scope: DeleteScope,
    ) -> anyhow::Result<UninstallReport> {
        let docroot = self
            .collaborators
            .docroots
            .resolve(hostname, path)
            .ok_or_else(|| {
                anyhow::Error::new(DeployError::precondition(format!(
                    "document root not found for {}",
                    hostname
                )))
            })?;

        let mut warnings = Vec::new();
        let command = self.recipe.cron_command(&docroot);
        let job_removed = match self
            .collaborators
            .scheduler
            .remove_job(self.recipe.cron_schedule, &command)
        {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %chain_message(&e), "failed to remove scheduled job");
                warnings.push(format!(
                    "scheduled job was not removed: {}",
                    chain_message(&e)
                ));
                false
            }
        };

        self.collaborators
            .lifecycle
            .remove(&docroot, scope)
            .with_context(|| format!("Failed to remove installation at {}", docroot.display()))?;

        tracing::info!(
            hostname,
            path,
            docroot = %docroot.display(),
            scope = ?scope,
            job_removed,
            "uninstall complete"
        );

        Ok(UninstallReport {
            docroot,
            scope,
            job_removed,
            warnings,
        })
    }
}
