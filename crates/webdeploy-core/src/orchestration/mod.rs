//! Install, uninstall and version-probe workflows over injected collaborators.

pub mod install;
pub mod probe;
pub mod uninstall;

use std::sync::Arc;

use crate::adapters::{
    AclEnforcer, ApplicationLifecycle, ArtifactFetcher, CredentialGenerator, DatabaseProvisioner,
    DocrootResolver, MetadataStore, Notifier, ProcessRunner, Scheduler,
};

pub use install::{InstallOrchestrator, InstallReport, InstallSettings, InstallState};
pub use probe::VersionProbe;
pub use uninstall::{UninstallOrchestrator, UninstallReport};

/// Every collaborator the workflows call out to.
///
/// Orchestrators hold these by composition; tests substitute fakes.
#[derive(Clone)]
pub struct Collaborators {
    pub docroots: Arc<dyn DocrootResolver>,
    pub database: Arc<dyn DatabaseProvisioner>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub scheduler: Arc<dyn Scheduler>,
    pub credentials: Arc<dyn CredentialGenerator>,
    pub processes: Arc<dyn ProcessRunner>,
    pub acl: Arc<dyn AclEnforcer>,
    pub metadata: Arc<dyn MetadataStore>,
    pub notifier: Arc<dyn Notifier>,
    pub lifecycle: Arc<dyn ApplicationLifecycle>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
