//! Database provisioning.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::adapters::credentials::CredentialGenerator;
use crate::adapters::process::{ProcessRequest, ProcessRunner};
use crate::config::DatabaseSection;
use crate::types::{AccountContext, DatabaseCredentials};

/// MySQL identifiers are limited to 32 characters for user names.
const MAX_IDENTIFIER_LEN: usize = 32;

pub trait DatabaseProvisioner: Send + Sync {
    /// Whether the account may create databases.
    fn enabled(&self) -> bool;

    /// Create an isolated database and a user limited to `connection_limit`
    /// concurrent connections. The returned limit is never lower than requested.
    fn create(
        &self,
        account: &AccountContext,
        hostname: &str,
        connection_limit: u32,
    ) -> anyhow::Result<DatabaseCredentials>;

    /// Drop a database and its user. Missing objects are not an error.
    fn destroy(&self, database: &str, username: &str) -> anyhow::Result<()>;
}

/// Provisions through the `mysql` command-line client.
///
/// SQL is handed to the client on stdin from an environment variable, so
/// generated passwords never appear in argv.
pub struct MysqlProvisioner {
    settings: DatabaseSection,
    runner: Arc<dyn ProcessRunner>,
    generator: Arc<dyn CredentialGenerator>,
    timeout: Duration,
}

impl std::fmt::Debug for MysqlProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlProvisioner")
            .field("settings", &self.settings)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MysqlProvisioner {
    pub fn new(
        settings: DatabaseSection,
        runner: Arc<dyn ProcessRunner>,
        generator: Arc<dyn CredentialGenerator>,
    ) -> Self {
        Self {
            settings,
            runner,
            generator,
            timeout: Duration::from_secs(60),
        }
    }

    fn grant_host(&self) -> &str {
        if self.settings.host == "localhost" || self.settings.host == "127.0.0.1" {
            "localhost"
        } else {
            "%"
        }
    }

    /// Database and user name for a new install, e.g. `acme_example` + suffix.
    fn identifier(&self, account: &AccountContext, hostname: &str) -> String {
        let prefix: String = sanitize_identifier(&account.account).chars().take(16).collect();
        let stem: String = sanitize_identifier(hostname).chars().take(8).collect();
        let suffix = self.generator.generate(4).to_ascii_lowercase();
        let mut name = format!("{}_{}{}", prefix, stem, suffix);
        name.truncate(MAX_IDENTIFIER_LEN);
        name
    }

    fn execute(&self, sql: String) -> anyhow::Result<()> {
        let request = ProcessRequest::new("printf '%s' \"$WEBDEPLOY_SQL\" | %(mysql)s --user=%(admin)s")
            .with_path_arg("mysql", self.settings.mysql_bin.clone())
            .with_path_arg("admin", self.settings.admin_user.clone())
            .with_env("WEBDEPLOY_SQL", sql)
            .with_timeout(self.timeout);

        let output = self
            .runner
            .run(&request)
            .context("Failed to run mysql client")?;
        if !output.success {
            anyhow::bail!(
                "mysql client exited with {:?}: {}",
                output.exit_code,
                output.output.trim()
            );
        }
        Ok(())
    }
}

impl DatabaseProvisioner for MysqlProvisioner {
    fn enabled(&self) -> bool {
        self.settings.enabled
    }

    fn create(
        &self,
        account: &AccountContext,
        hostname: &str,
        connection_limit: u32,
    ) -> anyhow::Result<DatabaseCredentials> {
        if !self.settings.enabled {
            anyhow::bail!("Databases are not enabled for account {}", account.account);
        }

        let name = self.identifier(account, hostname);
        let credentials = DatabaseCredentials {
            hostname: self.settings.host.clone(),
            username: name.clone(),
            password: self.generator.generate(16),
            database: name,
            connection_limit,
        };

        let host = self.grant_host();
        let sql = format!(
            "CREATE DATABASE `{db}` CHARACTER SET utf8mb4;\n\
             CREATE USER '{user}'@'{host}' IDENTIFIED BY '{password}' WITH MAX_USER_CONNECTIONS {limit};\n\
             GRANT ALL PRIVILEGES ON `{db}`.* TO '{user}'@'{host}';\n\
             FLUSH PRIVILEGES;\n",
            db = credentials.database,
            user = credentials.username,
            host = host,
            password = escape_sql_string(&credentials.password),
            limit = credentials.connection_limit,
        );

        self.execute(sql).with_context(|| {
            format!("Failed to create database {}", credentials.database)
        })?;

        tracing::info!(
            database = %credentials.database,
            connection_limit = credentials.connection_limit,
            "database created"
        );
        Ok(credentials)
    }

    fn destroy(&self, database: &str, username: &str) -> anyhow::Result<()> {
        let sql = format!(
            "DROP DATABASE IF EXISTS `{db}`;\nDROP USER IF EXISTS '{user}'@'{host}';\n",
            db = sanitize_identifier(database),
            user = sanitize_identifier(username),
            host = self.grant_host(),
        );
        self.execute(sql)
            .with_context(|| format!("Failed to drop database {}", database))?;
        tracing::info!(database, "database dropped");
        Ok(())
    }
}

/// Lowercase ASCII alphanumerics and underscores only.
fn sanitize_identifier(value: &str) -> String {
    value
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == '_' {
                Some('_')
            } else {
                None
            }
        })
        .collect()
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
