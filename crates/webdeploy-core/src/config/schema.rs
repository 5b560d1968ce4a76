//! Configuration schema for webdeploy.toml
//!
//! Every section is optional; a missing file or section falls back to
//! defaults suitable for a single-account host.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::recipe::WHMCS_VERSION_CHECK_URL;

/// Root configuration structure for webdeploy.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Hosting account name, used as the database name prefix
    #[serde(default = "default_account")]
    pub account: String,

    /// Directory for the job table, metadata, cache and notification outbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub catalog: CatalogSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub installer: InstallerSection,

    #[serde(default)]
    pub sites: SitesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default = "default_version_check_url")]
    pub version_check_url: String,

    /// Persist the release snapshot in the state dir instead of memory
    #[serde(default = "default_true")]
    pub cache_file: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host the application connects to
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Privileged user that creates databases and grants
    #[serde(default = "default_db_admin")]
    pub admin_user: String,

    #[serde(default = "default_mysql_bin")]
    pub mysql_bin: String,

    /// Requested connection limit; raised to the recipe floor
    #[serde(default = "default_connection_limit")]
    pub connection_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_true")]
    pub permitted: bool,

    /// Initial state when no job table exists yet
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallerSection {
    #[serde(default = "default_php_bin")]
    pub php_bin: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitesSection {
    /// Docroots live at `<web_root>/<hostname>/<path>`
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,

    /// User owning docroots; scheduled jobs run as this user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            account: default_account(),
            state_dir: None,
            catalog: CatalogSection::default(),
            database: DatabaseSection::default(),
            scheduler: SchedulerSection::default(),
            installer: InstallerSection::default(),
            sites: SitesSection::default(),
        }
    }
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            version_check_url: default_version_check_url(),
            cache_file: true,
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_db_host(),
            admin_user: default_db_admin(),
            mysql_bin: default_mysql_bin(),
            connection_limit: default_connection_limit(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            permitted: true,
            enabled: false,
        }
    }
}

impl Default for InstallerSection {
    fn default() -> Self {
        Self {
            php_bin: default_php_bin(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SitesSection {
    fn default() -> Self {
        Self {
            web_root: default_web_root(),
            owner: None,
        }
    }
}

impl DeployConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate field values that serde cannot check.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.account.trim().is_empty() {
            anyhow::bail!("account must not be empty");
        }
        url::Url::parse(&self.catalog.version_check_url).map_err(|e| {
            anyhow::anyhow!(
                "catalog.version_check_url '{}' is not a valid URL: {}",
                self.catalog.version_check_url,
                e
            )
        })?;
        if self.installer.timeout_secs == 0 {
            anyhow::bail!("installer.timeout_secs must be greater than zero");
        }
        if self.installer.php_bin.trim().is_empty() {
            anyhow::bail!("installer.php_bin must not be empty");
        }
        Ok(())
    }

    pub fn installer_timeout(&self) -> Duration {
        Duration::from_secs(self.installer.timeout_secs)
    }

    /// Configured state dir, or the platform data dir.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|p| p.join("webdeploy"))
                .unwrap_or_else(|| PathBuf::from(".webdeploy"))
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_account() -> String {
    "webdeploy".to_string()
}

fn default_version_check_url() -> String {
    WHMCS_VERSION_CHECK_URL.to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_admin() -> String {
    "root".to_string()
}

fn default_mysql_bin() -> String {
    "mysql".to_string()
}

fn default_connection_limit() -> u32 {
    10
}

fn default_php_bin() -> String {
    "/usr/bin/php".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_web_root() -> PathBuf {
    PathBuf::from("/var/www")
}
