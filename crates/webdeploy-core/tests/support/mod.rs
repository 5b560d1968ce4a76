//! In-memory collaborators shared by the workflow tests.
//!
//! Every fake appends to one [`EventLog`] so tests can assert on call order
//! as well as on what each collaborator saw.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use webdeploy_core::adapters::{
    AclEnforcer, ApplicationLifecycle, ArtifactFetcher, CredentialGenerator, DatabaseProvisioner,
    DocrootResolver, MetadataStore, Notifier, ProcessOutput, ProcessRequest, ProcessRunner,
    Scheduler,
};
use webdeploy_core::catalog::{MemoryCache, ReleaseCatalog, VersionCache, VersionSource};
use webdeploy_core::orchestration::{
    Collaborators, InstallOrchestrator, InstallSettings, UninstallOrchestrator, VersionProbe,
};
use webdeploy_core::recipe::AppRecipe;
use webdeploy_core::types::{
    AccountContext, AclProfile, AdminCredentials, DatabaseCredentials, DeleteScope, InstallMeta,
    Release, ReleaseMap, ScheduledJob,
};

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().position(|e| e.starts_with(prefix))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }
}

pub struct FakeDocroots {
    pub docroot: Option<PathBuf>,
    pub owner: String,
}

impl DocrootResolver for FakeDocroots {
    fn resolve(&self, _hostname: &str, _path: &str) -> Option<PathBuf> {
        self.docroot.clone().filter(|d| d.is_dir())
    }

    fn owner(&self, _docroot: &Path) -> anyhow::Result<String> {
        Ok(self.owner.clone())
    }
}

pub struct FakeDatabase {
    pub log: EventLog,
    pub enabled: bool,
    pub fail: bool,
    pub created: Mutex<Vec<(String, u32)>>,
    pub dropped: Mutex<Vec<String>>,
}

impl DatabaseProvisioner for FakeDatabase {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn create(
        &self,
        account: &AccountContext,
        hostname: &str,
        connection_limit: u32,
    ) -> anyhow::Result<DatabaseCredentials> {
        self.log.push(format!("database.create {}", connection_limit));
        if self.fail {
            anyhow::bail!("access denied for user 'root'");
        }
        self.created
            .lock()
            .unwrap()
            .push((hostname.to_string(), connection_limit));
        let name = format!("{}_{}", account.account, hostname.replace('.', ""));
        Ok(DatabaseCredentials {
            hostname: "localhost".to_string(),
            username: name.clone(),
            password: "dbpass".to_string(),
            database: name,
            connection_limit,
        })
    }

    fn destroy(&self, database: &str, _username: &str) -> anyhow::Result<()> {
        self.log.push(format!("database.destroy {}", database));
        self.dropped.lock().unwrap().push(database.to_string());
        Ok(())
    }
}

/// Lays out a minimal application tree instead of downloading one.
pub struct FakeFetcher {
    pub log: EventLog,
    pub fail: bool,
    pub fetched: Mutex<Vec<String>>,
}

impl ArtifactFetcher for FakeFetcher {
    fn fetch(&self, url: &str, destination: &Path, overwrite: bool) -> anyhow::Result<()> {
        self.log.push(format!("fetch {}", url));
        if self.fail {
            anyhow::bail!("connection reset");
        }
        assert!(overwrite, "install fetch must overwrite");
        self.fetched.lock().unwrap().push(url.to_string());
        for dir in [
            "install/bin",
            "crons",
            "attachments",
            "vendor/whmcs/whmcs-foundation/lib",
        ] {
            std::fs::create_dir_all(destination.join(dir))?;
        }
        std::fs::write(destination.join("install/bin/installer.php"), "<?php")?;
        std::fs::write(destination.join("crons/cron.php"), "<?php")?;
        std::fs::write(
            destination.join("vendor/whmcs/whmcs-foundation/lib/License.php"),
            "<?php",
        )?;
        Ok(())
    }
}

pub struct FakeScheduler {
    pub log: EventLog,
    pub permitted: bool,
    pub enabled: Mutex<bool>,
    pub can_enable: bool,
    pub fail_add: bool,
    pub fail_remove: bool,
    pub jobs: Mutex<Vec<ScheduledJob>>,
}

impl Scheduler for FakeScheduler {
    fn permitted(&self) -> bool {
        self.permitted
    }

    fn enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    fn set_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        self.log.push(format!("scheduler.set_enabled {}", enabled));
        if !self.can_enable {
            anyhow::bail!("crontab service unavailable");
        }
        *self.enabled.lock().unwrap() = enabled;
        Ok(())
    }

    fn add_job(&self, job: &ScheduledJob) -> anyhow::Result<bool> {
        self.log.push(format!("scheduler.add {}", job.command));
        if self.fail_add {
            anyhow::bail!("crontab is locked");
        }
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.iter().any(|j| j.matches(&job.schedule, &job.command)) {
            return Ok(false);
        }
        jobs.push(job.clone());
        Ok(true)
    }

    fn remove_job(&self, schedule: &str, command: &str) -> anyhow::Result<bool> {
        self.log.push(format!("scheduler.remove {}", command));
        if self.fail_remove {
            anyhow::bail!("crontab is locked");
        }
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|j| !j.matches(schedule, command));
        Ok(jobs.len() != before)
    }

    fn jobs(&self) -> anyhow::Result<Vec<ScheduledJob>> {
        Ok(self.jobs.lock().unwrap().clone())
    }
}

/// Deterministic secrets: `length` copies of one character.
pub struct FixedCredentials;

impl CredentialGenerator for FixedCredentials {
    fn generate(&self, length: usize) -> String {
        "k".repeat(length)
    }
}

pub struct FakeRunner {
    pub log: EventLog,
    pub success: bool,
    pub fail: bool,
    pub requests: Mutex<Vec<ProcessRequest>>,
}

impl ProcessRunner for FakeRunner {
    fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput> {
        self.log.push(format!("process.run {}", request.render()?));
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            anyhow::bail!("Process timed out after {:?}", request.timeout);
        }
        Ok(ProcessOutput {
            success: self.success,
            exit_code: Some(if self.success { 0 } else { 1 }),
            output: if self.success {
                "Installation complete".to_string()
            } else {
                "Error: invalid license key".to_string()
            },
        })
    }
}

#[derive(Default)]
pub struct FakeAcl {
    pub log: EventLog,
    pub fail: bool,
    pub applied: Mutex<Vec<AclProfile>>,
}

impl AclEnforcer for FakeAcl {
    fn apply(&self, _docroot: &Path, profile: AclProfile, _writable: &[&str]) -> anyhow::Result<()> {
        self.log.push(format!("acl.apply {}", profile));
        if self.fail {
            anyhow::bail!("operation not permitted");
        }
        self.applied.lock().unwrap().push(profile);
        Ok(())
    }

    fn current(&self, _docroot: &Path) -> anyhow::Result<Option<AclProfile>> {
        Ok(self.applied.lock().unwrap().last().copied())
    }
}

#[derive(Default)]
pub struct MemoryMetadata {
    pub log: EventLog,
    pub records: Mutex<HashMap<PathBuf, InstallMeta>>,
}

impl MetadataStore for MemoryMetadata {
    fn write(&self, docroot: &Path, meta: &InstallMeta) -> anyhow::Result<()> {
        self.log.push("metadata.write");
        self.records
            .lock()
            .unwrap()
            .insert(docroot.to_path_buf(), meta.clone());
        Ok(())
    }

    fn read(&self, docroot: &Path) -> anyhow::Result<Option<InstallMeta>> {
        Ok(self.records.lock().unwrap().get(docroot).cloned())
    }

    fn remove(&self, docroot: &Path) -> anyhow::Result<bool> {
        self.log.push("metadata.remove");
        Ok(self.records.lock().unwrap().remove(docroot).is_some())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub log: EventLog,
    pub fail: bool,
    pub sent: Mutex<Vec<(String, String, AdminCredentials)>>,
}

impl Notifier for FakeNotifier {
    fn notify_installed(
        &self,
        _app: &str,
        hostname: &str,
        path: &str,
        admin: &AdminCredentials,
    ) -> anyhow::Result<()> {
        self.log.push("notify");
        if self.fail {
            anyhow::bail!("mail relay unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((hostname.to_string(), path.to_string(), admin.clone()));
        Ok(())
    }
}

pub struct RecordingLifecycle {
    pub log: EventLog,
    pub metadata: Arc<MemoryMetadata>,
    pub removed: Mutex<Vec<DeleteScope>>,
}

impl ApplicationLifecycle for RecordingLifecycle {
    fn remove(&self, docroot: &Path, scope: DeleteScope) -> anyhow::Result<()> {
        self.log.push(format!("lifecycle.remove {:?}", scope));
        self.removed.lock().unwrap().push(scope);
        self.metadata.remove(docroot)?;
        Ok(())
    }

    fn detect_version(&self, docroot: &Path) -> anyhow::Result<Option<String>> {
        Ok(self.metadata.read(docroot)?.map(|meta| meta.version))
    }
}

pub struct CountingSource {
    pub calls: AtomicUsize,
    pub document: Option<serde_json::Value>,
}

impl CountingSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VersionSource for CountingSource {
    fn fetch_latest(&self) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.document
            .clone()
            .ok_or_else(|| anyhow::anyhow!("version endpoint unreachable"))
    }
}

pub fn release(version: &str, url: Option<&str>) -> Release {
    Release {
        version: version.to_string(),
        url: url.map(str::to_string),
        metadata: serde_json::Map::new(),
    }
}

pub fn catalog_of(releases: &[Release]) -> ReleaseMap {
    releases
        .iter()
        .map(|r| (r.version.clone(), r.clone()))
        .collect()
}

/// A docroot in a temp dir with every collaborator faked.
pub struct Harness {
    pub temp: TempDir,
    pub docroot: PathBuf,
    pub log: EventLog,
    pub docroots: Arc<FakeDocroots>,
    pub database: Arc<FakeDatabase>,
    pub fetcher: Arc<FakeFetcher>,
    pub scheduler: Arc<FakeScheduler>,
    pub runner: Arc<FakeRunner>,
    pub acl: Arc<FakeAcl>,
    pub metadata: Arc<MemoryMetadata>,
    pub notifier: Arc<FakeNotifier>,
    pub lifecycle: Arc<RecordingLifecycle>,
    pub cache: Arc<MemoryCache>,
    pub source: Arc<CountingSource>,
    pub connection_limit: u32,
}

/// Knobs for building a [`Harness`]; defaults describe a healthy host.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub docroot_exists: bool,
    pub database_enabled: bool,
    pub database_fails: bool,
    pub fetch_fails: bool,
    pub scheduler_permitted: bool,
    pub scheduler_enabled: bool,
    pub scheduler_can_enable: bool,
    pub scheduler_add_fails: bool,
    pub scheduler_remove_fails: bool,
    pub installer_succeeds: bool,
    pub installer_errors: bool,
    pub acl_fails: bool,
    pub notify_fails: bool,
    pub catalog: Option<ReleaseMap>,
    pub endpoint: Option<serde_json::Value>,
    pub connection_limit: u32,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            docroot_exists: true,
            database_enabled: true,
            database_fails: false,
            fetch_fails: false,
            scheduler_permitted: true,
            scheduler_enabled: true,
            scheduler_can_enable: true,
            scheduler_add_fails: false,
            scheduler_remove_fails: false,
            installer_succeeds: true,
            installer_errors: false,
            acl_fails: false,
            notify_fails: false,
            catalog: Some(catalog_of(&[release(
                "8.6.1",
                Some("https://releases.example.test/whmcs_v861_full.zip"),
            )])),
            endpoint: None,
            connection_limit: 10,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let temp = TempDir::new().unwrap();
        let docroot = temp.path().join("www").join("example.com");
        if options.docroot_exists {
            std::fs::create_dir_all(&docroot).unwrap();
        }
        let log = EventLog::default();
        let metadata = Arc::new(MemoryMetadata {
            log: log.clone(),
            ..Default::default()
        });

        let cache = Arc::new(MemoryCache::new());
        if let Some(catalog) = &options.catalog {
            cache.set("whmcs.versions", catalog).unwrap();
        }

        Self {
            docroot: docroot.clone(),
            docroots: Arc::new(FakeDocroots {
                docroot: Some(docroot),
                owner: "acme".to_string(),
            }),
            database: Arc::new(FakeDatabase {
                log: log.clone(),
                enabled: options.database_enabled,
                fail: options.database_fails,
                created: Mutex::new(Vec::new()),
                dropped: Mutex::new(Vec::new()),
            }),
            fetcher: Arc::new(FakeFetcher {
                log: log.clone(),
                fail: options.fetch_fails,
                fetched: Mutex::new(Vec::new()),
            }),
            scheduler: Arc::new(FakeScheduler {
                log: log.clone(),
                permitted: options.scheduler_permitted,
                enabled: Mutex::new(options.scheduler_enabled),
                can_enable: options.scheduler_can_enable,
                fail_add: options.scheduler_add_fails,
                fail_remove: options.scheduler_remove_fails,
                jobs: Mutex::new(Vec::new()),
            }),
            runner: Arc::new(FakeRunner {
                log: log.clone(),
                success: options.installer_succeeds,
                fail: options.installer_errors,
                requests: Mutex::new(Vec::new()),
            }),
            acl: Arc::new(FakeAcl {
                log: log.clone(),
                fail: options.acl_fails,
                applied: Mutex::new(Vec::new()),
            }),
            notifier: Arc::new(FakeNotifier {
                log: log.clone(),
                fail: options.notify_fails,
                sent: Mutex::new(Vec::new()),
            }),
            lifecycle: Arc::new(RecordingLifecycle {
                log: log.clone(),
                metadata: metadata.clone(),
                removed: Mutex::new(Vec::new()),
            }),
            metadata,
            cache,
            source: Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
                document: options.endpoint,
            }),
            connection_limit: options.connection_limit,
            log,
            temp,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            docroots: self.docroots.clone(),
            database: self.database.clone(),
            fetcher: self.fetcher.clone(),
            scheduler: self.scheduler.clone(),
            credentials: Arc::new(FixedCredentials),
            processes: self.runner.clone(),
            acl: self.acl.clone(),
            metadata: self.metadata.clone(),
            notifier: self.notifier.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn catalog(&self) -> ReleaseCatalog {
        ReleaseCatalog::new(self.cache.clone(), self.source.clone(), "whmcs.versions")
    }

    pub fn installer(&self) -> InstallOrchestrator {
        let mut settings = InstallSettings::new(AccountContext::new("acme"));
        settings.connection_limit = self.connection_limit;
        settings.installer_timeout = Duration::from_secs(5);
        InstallOrchestrator::new(self.collaborators(), self.catalog(), settings)
    }

    pub fn uninstaller(&self) -> UninstallOrchestrator {
        UninstallOrchestrator::new(self.collaborators(), AppRecipe::whmcs())
    }

    pub fn probe(&self) -> VersionProbe {
        VersionProbe::new(self.collaborators(), self.catalog(), AppRecipe::whmcs())
    }

    /// Jobs whose command is the cron command for this docroot.
    pub fn matching_jobs(&self) -> usize {
        let command = AppRecipe::whmcs().cron_command(&self.docroot);
        self.scheduler
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.command == command)
            .count()
    }

    /// True when no side-effecting collaborator was called.
    pub fn untouched(&self) -> bool {
        ["fetch", "database.create", "process.run", "scheduler.add", "metadata.write", "acl.apply", "notify"]
            .iter()
            .all(|prefix| !self.log.contains(prefix))
    }
}
