//! Webdeploy Core Library
//!
//! Installs and removes hosted web applications (WHMCS out of the box) on a
//! shared-hosting account: resolves a release from the vendor catalog,
//! unpacks it into the site docroot, provisions a database, drives the
//! application's own installer, schedules its cron job and locks down
//! filesystem permissions.
//!
//! Every side effect goes through a collaborator trait in [`adapters`]; the
//! workflows in [`orchestration`] only sequence them. [`context::Deployment`]
//! wires the host-local defaults from a [`config::DeployConfig`].

pub mod adapters;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod orchestration;
pub mod recipe;
mod runtime;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Workflows
    pub use crate::context::Deployment;
    pub use crate::orchestration::{
        Collaborators, InstallOrchestrator, InstallReport, InstallSettings, InstallState,
        UninstallOrchestrator, UninstallReport, VersionProbe,
    };

    // Errors
    pub use crate::error::{DeployError, InstallFailure};

    // Configuration
    pub use crate::config::{ConfigStore, DeployConfig};

    // Catalog
    pub use crate::catalog::{ReleaseCatalog, VersionCache, VersionSource};

    // Domain types
    pub use crate::recipe::AppRecipe;
    pub use crate::types::{
        AccountContext, AclProfile, AdminCredentials, DatabaseCredentials, DeleteScope,
        InstallMeta, InstallOptions, Release, ReleaseMap, ScheduledJob,
    };
}
