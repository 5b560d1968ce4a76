//! Shared core types used across the catalog, adapters and orchestrators.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller-supplied install options.
///
/// `user` and `password` are filled in by the install orchestrator when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    pub version: String,
    pub license_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl InstallOptions {
    pub fn new(version: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            license_key: license_key.into(),
            user: None,
            password: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A single downloadable release as reported by the version-check endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Every other field of the endpoint response, kept verbatim.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Version string to release mapping.
pub type ReleaseMap = BTreeMap<String, Release>;

/// Database connection parameters produced by a provisioner.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub connection_limit: u32,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connection_limit", &self.connection_limit)
            .finish()
    }
}

/// Administrator login handed to the native installer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Named filesystem permission profile ("fortification").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclProfile {
    /// Writable set used during and right after install.
    Min,
    /// Writable set for a finished install.
    Max,
}

impl AclProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclProfile::Min => "min",
            AclProfile::Max => "max",
        }
    }
}

impl fmt::Display for AclProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AclProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(AclProfile::Min),
            "max" => Ok(AclProfile::Max),
            other => anyhow::bail!("Unknown ACL profile '{}'. Valid values: min, max", other),
        }
    }
}

/// A periodic background job, identified by its exact command string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub schedule: String,
    pub command: String,
    pub user: String,
}

impl ScheduledJob {
    pub fn matches(&self, schedule: &str, command: &str) -> bool {
        self.schedule == schedule && self.command == command
    }
}

/// How much of an installation the generic uninstall sweep removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteScope {
    /// Files, database and metadata.
    #[default]
    All,
    /// Docroot contents and metadata; the database is kept.
    Files,
    /// Database and metadata; files are kept.
    Database,
    /// Only the installation record.
    Meta,
}

impl DeleteScope {
    pub fn removes_files(&self) -> bool {
        matches!(self, DeleteScope::All | DeleteScope::Files)
    }

    pub fn removes_database(&self) -> bool {
        matches!(self, DeleteScope::All | DeleteScope::Database)
    }
}

impl FromStr for DeleteScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DeleteScope::All),
            "files" => Ok(DeleteScope::Files),
            "database" | "db" => Ok(DeleteScope::Database),
            "meta" => Ok(DeleteScope::Meta),
            other => anyhow::bail!(
                "Unknown delete scope '{}'. Valid values: all, files, database, meta",
                other
            ),
        }
    }
}

/// Installation record persisted by the metadata store.
///
/// Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMeta {
    pub app: String,
    pub version: String,
    pub hostname: String,
    #[serde(default)]
    pub path: String,
    pub admin_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_user: Option<String>,
    pub installed_at: chrono::DateTime<chrono::Utc>,
}

/// Account the installation is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    /// Account name, used as the database name prefix.
    pub account: String,
}

impl AccountContext {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }
}
