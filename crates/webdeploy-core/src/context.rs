//! Deployment context wiring the default collaborators from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::{
    FileMetadataStore, FileScheduler, FsAclEnforcer, GenericLifecycle, HttpArtifactFetcher,
    MappedDocrootResolver, MysqlProvisioner, OutboxNotifier, RandomCredentialGenerator,
    ShellProcessRunner,
};
use crate::catalog::{FileCache, HttpVersionSource, MemoryCache, ReleaseCatalog, VersionCache};
use crate::config::{ConfigStore, DeployConfig};
use crate::orchestration::{
    Collaborators, InstallOrchestrator, InstallSettings, UninstallOrchestrator, VersionProbe,
};
use crate::recipe::AppRecipe;
use crate::types::AccountContext;

/// Host-local deployment environment.
///
/// Embedders build this once from a [`DeployConfig`] and ask it for
/// orchestrators. All adapter state lives under the state dir:
///
/// ```text
/// <state>/jobs.json    scheduled jobs
/// <state>/meta/        install records
/// <state>/cache/       release snapshot
/// <state>/acl/         applied ACL profiles
/// <state>/outbox/      install notifications
/// ```
#[derive(Debug, Clone)]
pub struct Deployment {
    config: DeployConfig,
    state_dir: PathBuf,
    recipe: AppRecipe,
    collaborators: Collaborators,
    catalog: ReleaseCatalog,
}

impl Deployment {
    /// Load configuration from `store` and wire the default adapters.
    pub fn load(store: &ConfigStore) -> anyhow::Result<Self> {
        let config = store.load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: DeployConfig) -> anyhow::Result<Self> {
        Self::with_recipe(config, AppRecipe::whmcs())
    }

    pub fn with_recipe(config: DeployConfig, recipe: AppRecipe) -> anyhow::Result<Self> {
        config.validate()?;
        let state_dir = config.resolved_state_dir();

        let processes = Arc::new(ShellProcessRunner::new());
        let credentials = Arc::new(RandomCredentialGenerator);
        let database = Arc::new(MysqlProvisioner::new(
            config.database.clone(),
            processes.clone(),
            credentials.clone(),
        ));
        let metadata = Arc::new(FileMetadataStore::new(state_dir.join("meta")));
        let lifecycle = Arc::new(GenericLifecycle::new(metadata.clone(), database.clone()));

        let collaborators = Collaborators {
            docroots: Arc::new(MappedDocrootResolver::new(
                config.sites.web_root.clone(),
                config.sites.owner.clone(),
            )),
            database,
            fetcher: Arc::new(HttpArtifactFetcher::new()),
            scheduler: Arc::new(FileScheduler::new(
                state_dir.join("jobs.json"),
                config.scheduler.permitted,
                config.scheduler.enabled,
            )),
            credentials,
            processes,
            acl: Arc::new(FsAclEnforcer::new(state_dir.clone())),
            metadata,
            notifier: Arc::new(OutboxNotifier::new(state_dir.join("outbox"))),
            lifecycle,
        };

        let cache: Arc<dyn VersionCache> = if config.catalog.cache_file {
            Arc::new(FileCache::new(state_dir.join("cache")))
        } else {
            Arc::new(MemoryCache::new())
        };
        let catalog = ReleaseCatalog::new(
            cache,
            Arc::new(HttpVersionSource::new(config.catalog.version_check_url.clone())),
            recipe.cache_key,
        );

        tracing::debug!(
            state_dir = %state_dir.display(),
            web_root = %config.sites.web_root.display(),
            "deployment context ready"
        );

        Ok(Self {
            config,
            state_dir,
            recipe,
            collaborators,
            catalog,
        })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn recipe(&self) -> &AppRecipe {
        &self.recipe
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn catalog(&self) -> &ReleaseCatalog {
        &self.catalog
    }

    pub fn install_settings(&self) -> InstallSettings {
        InstallSettings {
            recipe: self.recipe.clone(),
            account: AccountContext::new(self.config.account.clone()),
            connection_limit: self.config.database.connection_limit,
            php_bin: self.config.installer.php_bin.clone(),
            installer_timeout: self.config.installer_timeout(),
        }
    }

    pub fn install_orchestrator(&self) -> InstallOrchestrator {
        InstallOrchestrator::new(
            self.collaborators.clone(),
            self.catalog.clone(),
            self.install_settings(),
        )
    }

    pub fn uninstall_orchestrator(&self) -> UninstallOrchestrator {
        UninstallOrchestrator::new(self.collaborators.clone(), self.recipe.clone())
    }

    pub fn version_probe(&self) -> VersionProbe {
        VersionProbe::new(
            self.collaborators.clone(),
            self.catalog.clone(),
            self.recipe.clone(),
        )
    }
}
