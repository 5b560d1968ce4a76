//! Install workflow, run as an explicit state machine.
//!
//! Each state either hands its product to the next state or stops the run
//! with an [`InstallFailure`] naming the state it failed in. Nothing already
//! done is undone on failure; cleanup is a caller-invoked uninstall.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use crate::adapters::ProcessRequest;
use crate::catalog::ReleaseCatalog;
use crate::error::{DeployError, InstallFailure, chain_message};
use crate::orchestration::Collaborators;
use crate::recipe::AppRecipe;
use crate::types::{
    AccountContext, AclProfile, AdminCredentials, DatabaseCredentials, InstallMeta,
    InstallOptions, ScheduledJob,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Validating,
    ResolvingRelease,
    Fetching,
    ProvisioningDatabase,
    RunningNativeInstaller,
    SchedulingJob,
    Finalizing,
    Done,
    Failed,
}

impl InstallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallState::Validating => "validating",
            InstallState::ResolvingRelease => "resolving release",
            InstallState::Fetching => "fetching",
            InstallState::ProvisioningDatabase => "provisioning database",
            InstallState::RunningNativeInstaller => "running native installer",
            InstallState::SchedulingJob => "scheduling job",
            InstallState::Finalizing => "finalizing",
            InstallState::Done => "done",
            InstallState::Failed => "failed",
        }
    }

    /// Successor on success. `Done` and `Failed` have none.
    pub fn next(&self) -> Option<InstallState> {
        match self {
            InstallState::Validating => Some(InstallState::ResolvingRelease),
            InstallState::ResolvingRelease => Some(InstallState::Fetching),
            InstallState::Fetching => Some(InstallState::ProvisioningDatabase),
            InstallState::ProvisioningDatabase => Some(InstallState::RunningNativeInstaller),
            InstallState::RunningNativeInstaller => Some(InstallState::SchedulingJob),
            InstallState::SchedulingJob => Some(InstallState::Finalizing),
            InstallState::Finalizing => Some(InstallState::Done),
            InstallState::Done | InstallState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables of the install workflow that do not come from collaborators.
#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub recipe: AppRecipe,
    pub account: AccountContext,
    /// Requested database connection limit; raised to the recipe's floor.
    pub connection_limit: u32,
    pub php_bin: String,
    pub installer_timeout: Duration,
}

impl InstallSettings {
    pub fn new(account: AccountContext) -> Self {
        Self {
            recipe: AppRecipe::whmcs(),
            account,
            connection_limit: 10,
            php_bin: "/usr/bin/php".to_string(),
            installer_timeout: Duration::from_secs(300),
        }
    }

    /// Limit actually requested from the provisioner.
    pub fn effective_connection_limit(&self) -> u32 {
        self.connection_limit.max(self.recipe.min_connection_limit)
    }
}

/// Outcome of a completed install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub hostname: String,
    pub path: String,
    pub docroot: PathBuf,
    pub version: String,
    pub admin: AdminCredentials,
    pub database: DatabaseCredentials,
    pub job: ScheduledJob,
    /// `false` when an identical job was already scheduled.
    pub job_added: bool,
    /// Non-fatal problems hit after the installation itself succeeded.
    pub warnings: Vec<String>,
    /// States entered, in order.
    pub states: Vec<InstallState>,
}

/// Tracks the current state and the trail of states entered.
#[derive(Debug)]
struct StateMachine<'a> {
    hostname: &'a str,
    current: Option<InstallState>,
    trail: Vec<InstallState>,
}

impl<'a> StateMachine<'a> {
    fn new(hostname: &'a str) -> Self {
        Self {
            hostname,
            current: None,
            trail: Vec::new(),
        }
    }

    fn enter(&mut self, state: InstallState) {
        debug_assert!(
            self.current.map_or(state == InstallState::Validating, |c| c.next() == Some(state)),
            "invalid install transition {:?} -> {}",
            self.current,
            state
        );
        tracing::info!(hostname = self.hostname, state = %state, "install state");
        self.current = Some(state);
        self.trail.push(state);
    }

    fn step<T>(
        &mut self,
        state: InstallState,
        run: impl FnOnce() -> Result<T, DeployError>,
    ) -> Result<T, InstallFailure> {
        self.enter(state);
        run().map_err(|error| {
            tracing::warn!(hostname = self.hostname, state = %state, error = %error, "install failed");
            self.current = Some(InstallState::Failed);
            self.trail.push(InstallState::Failed);
            InstallFailure::new(state, error)
        })
    }

    fn into_trail(self) -> Vec<InstallState> {
        self.trail
    }
}

pub struct InstallOrchestrator {
    collaborators: Collaborators,
    catalog: ReleaseCatalog,
    settings: InstallSettings,
}

impl fmt::Debug for InstallOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallOrchestrator")
            .field("catalog", &self.catalog)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl InstallOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        catalog: ReleaseCatalog,
        settings: InstallSettings,
    ) -> Self {
        Self {
            collaborators,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &ReleaseCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &InstallSettings {
        &self.settings
    }

    /// Install the application at `hostname`/`path`.
    ///
    /// Everything that can be checked without side effects is checked in
    /// `Validating`, so a bad request never downloads or provisions anything.
    pub fn install(
        &self,
        hostname: &str,
        path: &str,
        options: InstallOptions,
    ) -> Result<InstallReport, InstallFailure> {
        let mut machine = StateMachine::new(hostname);
        let mut warnings = Vec::new();

        let docroot = machine.step(InstallState::Validating, || {
            self.validate(hostname, path, &options)
        })?;
        let url = machine.step(InstallState::ResolvingRelease, || {
            self.resolve_url(&options.version)
        })?;
        machine.step(InstallState::Fetching, || self.fetch(&url, &docroot))?;
        let database = machine.step(InstallState::ProvisioningDatabase, || {
            self.provision_database(hostname)
        })?;
        let admin = self.admin_credentials(&options);
        machine.step(InstallState::RunningNativeInstaller, || {
            self.run_installer(&docroot, &options, &admin, &database, &mut warnings)
        })?;
        let (job, job_added) =
            machine.step(InstallState::SchedulingJob, || self.schedule_job(&docroot))?;
        machine.step(InstallState::Finalizing, || {
            self.record_install(&docroot, hostname, path, &options, &admin, &database, &mut warnings);
            Ok(())
        })?;

        machine.enter(InstallState::Done);
        self.complete(&docroot, hostname, path, &admin, &mut warnings);

        tracing::info!(
            hostname,
            path,
            version = %options.version,
            warnings = warnings.len(),
            "install complete"
        );

        Ok(InstallReport {
            hostname: hostname.to_string(),
            path: path.to_string(),
            docroot,
            version: options.version,
            admin,
            database,
            job,
            job_added,
            warnings,
            states: machine.into_trail(),
        })
    }

    fn validate(
        &self,
        hostname: &str,
        path: &str,
        options: &InstallOptions,
    ) -> Result<PathBuf, DeployError> {
        let collaborators = &self.collaborators;
        let app = self.settings.recipe.name;

        if !collaborators.database.enabled() {
            return Err(DeployError::precondition(format!(
                "database unavailable, MySQL must be enabled to install {}",
                app
            )));
        }

        let docroot = collaborators.docroots.resolve(hostname, path).ok_or_else(|| {
            DeployError::precondition(format!("document root not found for {}", hostname))
        })?;

        if options.license_key.trim().is_empty() {
            return Err(DeployError::validation(format!(
                "a {} license key is required",
                app
            )));
        }
        if options.version.trim().is_empty() {
            return Err(DeployError::validation("a version is required"));
        }

        if !collaborators.scheduler.permitted() {
            return Err(DeployError::precondition(
                "scheduling not permitted for this account",
            ));
        }
        if !collaborators.scheduler.enabled() {
            collaborators.scheduler.set_enabled(true).map_err(|e| {
                DeployError::precondition(format!(
                    "failed to enable scheduling: {}",
                    chain_message(&e)
                ))
            })?;
            tracing::info!(hostname, "task scheduling enabled");
        }

        Ok(docroot)
    }

    fn resolve_url(&self, version: &str) -> Result<String, DeployError> {
        let release = self.catalog.resolve(version)?;
        release
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DeployError::resolution(format!("no install URL for version {}", version)))
    }

    fn fetch(&self, url: &str, docroot: &Path) -> Result<(), DeployError> {
        self.collaborators
            .fetcher
            .fetch(url, docroot, true)
            .map_err(|e| DeployError::Fetch(chain_message(&e)))
    }

    fn provision_database(&self, hostname: &str) -> Result<DatabaseCredentials, DeployError> {
        let limit = self.settings.effective_connection_limit();
        let database = self
            .collaborators
            .database
            .create(&self.settings.account, hostname, limit)
            .map_err(|e| DeployError::Provisioning(chain_message(&e)))?;
        tracing::info!(
            hostname,
            database = %database.database,
            connection_limit = database.connection_limit,
            "database provisioned"
        );
        Ok(database)
    }

    fn admin_credentials(&self, options: &InstallOptions) -> AdminCredentials {
        let recipe = &self.settings.recipe;
        let username = options
            .user
            .clone()
            .filter(|user| !user.trim().is_empty())
            .unwrap_or_else(|| recipe.admin_username.to_string());
        let password = options
            .password
            .clone()
            .filter(|password| !password.is_empty())
            .unwrap_or_else(|| {
                self.collaborators
                    .credentials
                    .generate(recipe.admin_password_length)
            });
        AdminCredentials { username, password }
    }

    /// One-shot configuration handed to the native installer.
    fn installer_payload(
        &self,
        options: &InstallOptions,
        admin: &AdminCredentials,
        database: &DatabaseCredentials,
    ) -> serde_json::Value {
        let recipe = &self.settings.recipe;
        json!({
            "admin": {
                "username": admin.username,
                "password": admin.password,
            },
            "configuration": {
                "license": options.license_key,
                "db_host": database.hostname,
                "db_username": database.username,
                "db_password": database.password,
                "db_name": database.database,
                "cc_encryption_hash": self.collaborators.credentials.generate(recipe.secret_length),
                "mysql_charset": recipe.mysql_charset,
            },
        })
    }

    fn run_installer(
        &self,
        docroot: &Path,
        options: &InstallOptions,
        admin: &AdminCredentials,
        database: &DatabaseCredentials,
        warnings: &mut Vec<String>,
    ) -> Result<(), DeployError> {
        let recipe = &self.settings.recipe;
        let payload = self.installer_payload(options, admin, database).to_string();
        let request = ProcessRequest::new(recipe.installer_template)
            .with_path_arg("path", docroot.to_string_lossy())
            .with_path_arg("php", self.settings.php_bin.as_str())
            .with_env(recipe.installer_env, payload)
            .with_timeout(self.settings.installer_timeout)
            .with_working_dir(docroot.to_path_buf());

        let output = self
            .collaborators
            .processes
            .run(&request)
            .map_err(|e| DeployError::NativeInstaller(chain_message(&e)))?;
        if !output.success {
            let status = output
                .exit_code
                .map(|code| format!("status {}", code))
                .unwrap_or_else(|| "no exit status".to_string());
            return Err(DeployError::NativeInstaller(format!(
                "installer exited with {}: {}",
                status,
                last_line(&output.output)
            )));
        }

        let installer_dir = docroot.join(recipe.installer_dir);
        if let Err(e) = crate::fs::remove_path_if_exists(&installer_dir) {
            tracing::warn!(error = %chain_message(&e), "failed to remove installer directory");
            warnings.push(format!(
                "installer directory {} was not removed: {}",
                installer_dir.display(),
                chain_message(&e)
            ));
        }
        Ok(())
    }

    fn schedule_job(&self, docroot: &Path) -> Result<(ScheduledJob, bool), DeployError> {
        let collaborators = &self.collaborators;
        let owner = collaborators.docroots.owner(docroot).map_err(|e| {
            DeployError::Scheduling(format!(
                "failed to determine docroot owner: {}",
                chain_message(&e)
            ))
        })?;
        let job = self.settings.recipe.scheduled_job(docroot, owner);
        let added = collaborators
            .scheduler
            .add_job(&job)
            .map_err(|e| DeployError::Scheduling(chain_message(&e)))?;
        if !added {
            tracing::debug!(command = %job.command, "scheduled job already present");
        }
        Ok((job, added))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_install(
        &self,
        docroot: &Path,
        hostname: &str,
        path: &str,
        options: &InstallOptions,
        admin: &AdminCredentials,
        database: &DatabaseCredentials,
        warnings: &mut Vec<String>,
    ) {
        let meta = InstallMeta {
            app: self.settings.recipe.name.to_string(),
            version: options.version.clone(),
            hostname: hostname.to_string(),
            path: path.to_string(),
            admin_user: admin.username.clone(),
            database: Some(database.database.clone()),
            database_user: Some(database.username.clone()),
            installed_at: chrono::Utc::now(),
        };
        if let Err(e) = self.collaborators.metadata.write(docroot, &meta) {
            tracing::warn!(error = %chain_message(&e), "failed to record install metadata");
            warnings.push(format!(
                "install metadata was not recorded: {}",
                chain_message(&e)
            ));
        }

        if let Err(e) = self.write_version_marker(docroot, &options.version) {
            tracing::warn!(error = %chain_message(&e), "failed to write version marker");
            warnings.push(format!(
                "version marker was not written: {}",
                chain_message(&e)
            ));
        }
    }

    /// Release archives carry no version file, so the installed version is
    /// stamped into the docroot for later probes.
    fn write_version_marker(&self, docroot: &Path, version: &str) -> anyhow::Result<()> {
        let marker = docroot.join(self.settings.recipe.version_marker);
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&marker, format!("{}\n", version))
            .with_context(|| format!("Failed to write version marker: {}", marker.display()))
    }

    fn complete(
        &self,
        docroot: &Path,
        hostname: &str,
        path: &str,
        admin: &AdminCredentials,
        warnings: &mut Vec<String>,
    ) {
        let recipe = &self.settings.recipe;
        let collaborators = &self.collaborators;

        if let Err(e) =
            collaborators
                .acl
                .apply(docroot, AclProfile::Max, recipe.acl_paths(AclProfile::Max))
        {
            tracing::warn!(error = %chain_message(&e), "failed to apply ACL profile");
            warnings.push(format!(
                "{} profile was not applied: {}",
                AclProfile::Max,
                chain_message(&e)
            ));
        }

        if let Err(e) = collaborators
            .notifier
            .notify_installed(recipe.name, hostname, path, admin)
        {
            tracing::warn!(error = %chain_message(&e), "failed to send install notification");
            warnings.push(format!(
                "install notification was not sent: {}",
                chain_message(&e)
            ));
        }
    }
}

fn last_line(output: &str) -> String {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output");
    line.chars().take(200).collect()
}
