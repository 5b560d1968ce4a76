//! Periodic job management.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::ScheduledJob;

pub trait Scheduler: Send + Sync {
    /// Whether the account may use task scheduling at all.
    fn permitted(&self) -> bool;

    fn enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool) -> anyhow::Result<()>;

    /// Add `job`. Returns `false` when an identical job already exists.
    fn add_job(&self, job: &ScheduledJob) -> anyhow::Result<bool>;

    /// Remove the job matching `schedule` and `command` exactly.
    /// Returns `false` when no such job exists.
    fn remove_job(&self, schedule: &str, command: &str) -> anyhow::Result<bool>;

    fn jobs(&self) -> anyhow::Result<Vec<ScheduledJob>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobTable {
    enabled: bool,
    #[serde(default)]
    jobs: Vec<ScheduledJob>,
}

/// Job table persisted as JSON in the state directory.
#[derive(Debug)]
pub struct FileScheduler {
    path: PathBuf,
    permitted: bool,
    enabled_by_default: bool,
    lock: Mutex<()>,
}

impl FileScheduler {
    pub fn new(path: PathBuf, permitted: bool, enabled_by_default: bool) -> Self {
        Self {
            path,
            permitted,
            enabled_by_default,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<JobTable> {
        if !self.path.exists() {
            return Ok(JobTable {
                enabled: self.enabled_by_default,
                jobs: Vec::new(),
            });
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read job table: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse job table: {}", self.path.display()))
    }

    fn save(&self, table: &JobTable) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create job table directory: {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(table).context("Failed to serialize jobs")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write job table: {}", self.path.display()))
    }

    fn update<T>(&self, f: impl FnOnce(&mut JobTable) -> (T, bool)) -> anyhow::Result<T> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.load()?;
        let (result, changed) = f(&mut table);
        if changed {
            self.save(&table)?;
        }
        Ok(result)
    }
}

impl Scheduler for FileScheduler {
    fn permitted(&self) -> bool {
        self.permitted
    }

    fn enabled(&self) -> bool {
        match self.load() {
            Ok(table) => table.enabled,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "job table unreadable, treating scheduling as disabled");
                false
            }
        }
    }

    fn set_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        if enabled && !self.permitted {
            anyhow::bail!("Task scheduling is not permitted for this account");
        }
        self.update(|table| {
            let changed = table.enabled != enabled;
            table.enabled = enabled;
            ((), changed || !self.path.exists())
        })
    }

    fn add_job(&self, job: &ScheduledJob) -> anyhow::Result<bool> {
        if !self.permitted {
            anyhow::bail!("Task scheduling is not permitted for this account");
        }
        self.update(|table| {
            if table.jobs.iter().any(|j| j.matches(&job.schedule, &job.command)) {
                return (false, false);
            }
            table.jobs.push(job.clone());
            (true, true)
        })
    }

    fn remove_job(&self, schedule: &str, command: &str) -> anyhow::Result<bool> {
        self.update(|table| {
            let before = table.jobs.len();
            table.jobs.retain(|j| !j.matches(schedule, command));
            let removed = table.jobs.len() != before;
            (removed, removed)
        })
    }

    fn jobs(&self) -> anyhow::Result<Vec<ScheduledJob>> {
        Ok(self.load()?.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(command: &str) -> ScheduledJob {
        ScheduledJob {
            schedule: "*/5 * * * *".to_string(),
            command: command.to_string(),
            user: "acme".to_string(),
        }
    }

    #[test]
    fn add_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let scheduler = FileScheduler::new(temp.path().join("jobs.json"), true, true);

        assert!(scheduler.add_job(&job("php -q /srv/a/crons/cron.php")).unwrap());
        assert!(!scheduler.add_job(&job("php -q /srv/a/crons/cron.php")).unwrap());
        assert_eq!(scheduler.jobs().unwrap().len(), 1);
    }

    #[test]
    fn remove_matches_exact_command() {
        let temp = TempDir::new().unwrap();
        let scheduler = FileScheduler::new(temp.path().join("jobs.json"), true, true);
        scheduler.add_job(&job("php -q /srv/a/crons/cron.php")).unwrap();
        scheduler.add_job(&job("php -q /srv/ab/crons/cron.php")).unwrap();

        assert!(!scheduler.remove_job("*/5 * * * *", "php -q /srv/a").unwrap());
        assert!(scheduler
            .remove_job("*/5 * * * *", "php -q /srv/a/crons/cron.php")
            .unwrap());

        let remaining = scheduler.jobs().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].command, "php -q /srv/ab/crons/cron.php");
    }

    #[test]
    fn removing_missing_job_is_noop() {
        let temp = TempDir::new().unwrap();
        let scheduler = FileScheduler::new(temp.path().join("jobs.json"), true, false);
        assert!(!scheduler.remove_job("*/5 * * * *", "php -q x").unwrap());
        assert!(!temp.path().join("jobs.json").exists());
    }

    #[test]
    fn enable_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jobs.json");
        let scheduler = FileScheduler::new(path.clone(), true, false);
        assert!(!scheduler.enabled());

        scheduler.set_enabled(true).unwrap();
        assert!(FileScheduler::new(path, true, false).enabled());
    }

    #[test]
    fn not_permitted_refuses_enable_and_add() {
        let temp = TempDir::new().unwrap();
        let scheduler = FileScheduler::new(temp.path().join("jobs.json"), false, false);
        assert!(!scheduler.permitted());
        assert!(scheduler.set_enabled(true).is_err());
        assert!(scheduler.add_job(&job("php -q x")).is_err());
    }
}
