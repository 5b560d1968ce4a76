//! Install-complete notifications for the account owner.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::types::AdminCredentials;

pub trait Notifier: Send + Sync {
    fn notify_installed(
        &self,
        app: &str,
        hostname: &str,
        path: &str,
        admin: &AdminCredentials,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct InstalledNotice<'a> {
    kind: &'static str,
    app: &'a str,
    hostname: &'a str,
    path: &'a str,
    admin: &'a AdminCredentials,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Drops one JSON message per notification into an outbox directory for the
/// mail relay to pick up. Messages contain credentials and are owner-only.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Notifier for OutboxNotifier {
    fn notify_installed(
        &self,
        app: &str,
        hostname: &str,
        path: &str,
        admin: &AdminCredentials,
    ) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create outbox: {}", self.dir.display()))?;

        let notice = InstalledNotice {
            kind: "installed",
            app,
            hostname,
            path,
            admin,
            created_at: chrono::Utc::now(),
        };
        let file_name = format!(
            "{}-{}.json",
            notice.created_at.format("%Y%m%dT%H%M%S%.f"),
            hostname.replace(|c: char| !c.is_ascii_alphanumeric() && c != '.', "_")
        );
        let target = self.dir.join(file_name);
        let content =
            serde_json::to_string_pretty(&notice).context("Failed to serialize notification")?;
        let mut file = open_private(&target)
            .with_context(|| format!("Failed to create notification: {}", target.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write notification: {}", target.display()))?;

        tracing::info!(hostname, path, admin = %admin.username, "install notification queued");
        Ok(())
    }
}

/// Create `path` readable by the owner only. Never reuses an existing file.
fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
