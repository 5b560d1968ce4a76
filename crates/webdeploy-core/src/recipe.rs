//! Application recipe: the per-application constants the workflow runs on.
//!
//! The orchestrators never hard-code application details; another web
//! application plugs in by supplying its own [`AppRecipe`].

use std::path::Path;

use crate::types::{AclProfile, ScheduledJob};

/// Cache key of the release catalog snapshot.
pub const WHMCS_CACHE_KEY: &str = "whmcs.versions";

/// Public version-check endpoint for WHMCS releases.
pub const WHMCS_VERSION_CHECK_URL: &str = "https://api1.whmcs.com/download/latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecipe {
    /// Display name, also recorded in install metadata.
    pub name: &'static str,
    pub cache_key: &'static str,
    /// Administrator username created by the native installer.
    pub admin_username: &'static str,
    pub admin_password_length: usize,
    pub secret_length: usize,
    /// Floor for the database connection limit.
    pub min_connection_limit: u32,
    pub cron_schedule: &'static str,
    /// Cron script relative to the docroot.
    pub cron_script: &'static str,
    /// Directory of the bundled installer, removed after a successful run.
    pub installer_dir: &'static str,
    /// Installer command; `%(path)s` is the docroot, `%(php)s` the interpreter.
    pub installer_template: &'static str,
    /// Environment variable carrying the installer payload.
    pub installer_env: &'static str,
    pub mysql_charset: &'static str,
    /// File whose presence marks a valid installation.
    pub install_marker: &'static str,
    /// File whose first token is the installed version; stamped on install.
    pub version_marker: &'static str,
    pub acl_min: &'static [&'static str],
    pub acl_max: &'static [&'static str],
}

impl AppRecipe {
    pub fn whmcs() -> Self {
        Self {
            name: "WHMCS",
            cache_key: WHMCS_CACHE_KEY,
            admin_username: "admin",
            admin_password_length: 10,
            secret_length: 64,
            min_connection_limit: 15,
            cron_schedule: "*/5 * * * *",
            cron_script: "crons/cron.php",
            installer_dir: "install",
            installer_template: "printf '%s' \"$CONF\" | %(php)s -f %(path)s/install/bin/installer.php -- -i -n -c",
            installer_env: "CONF",
            mysql_charset: "utf8",
            install_marker: "vendor/whmcs/whmcs-foundation/lib/License.php",
            version_marker: "resources/version.txt",
            acl_min: &["attachments", "downloads", "templates_c", ".htaccess"],
            acl_max: &["attachments", "downloads", "templates_c"],
        }
    }

    /// Writable paths of an ACL profile, relative to the docroot.
    pub fn acl_paths(&self, profile: AclProfile) -> &'static [&'static str] {
        match profile {
            AclProfile::Min => self.acl_min,
            AclProfile::Max => self.acl_max,
        }
    }

    /// Exact cron command for a docroot; uninstall matches on this string.
    pub fn cron_command(&self, docroot: &Path) -> String {
        format!("php -q {}/{}", docroot.display(), self.cron_script)
    }

    pub fn scheduled_job(&self, docroot: &Path, user: impl Into<String>) -> ScheduledJob {
        ScheduledJob {
            schedule: self.cron_schedule.to_string(),
            command: self.cron_command(docroot),
            user: user.into(),
        }
    }
}

impl Default for AppRecipe {
    fn default() -> Self {
        Self::whmcs()
    }
}
