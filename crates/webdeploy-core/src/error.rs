//! Workflow error taxonomy.

use thiserror::Error;

use crate::orchestration::InstallState;

/// Failure categories surfaced by the install/uninstall workflows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// Environment is not ready: database or scheduling disabled, docroot missing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A required option is missing or malformed.
    #[error("invalid options: {0}")]
    Validation(String),

    /// Unknown version or a release without an artifact URL.
    #[error("release resolution failed: {0}")]
    Resolution(String),

    #[error("artifact fetch failed: {0}")]
    Fetch(String),

    #[error("database provisioning failed: {0}")]
    Provisioning(String),

    /// Installer subprocess failed, timed out, or reported no success.
    #[error("native installer failed: {0}")]
    NativeInstaller(String),

    #[error("scheduled job failure: {0}")]
    Scheduling(String),
}

impl DeployError {
    pub fn precondition(message: impl Into<String>) -> Self {
        DeployError::Precondition(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DeployError::Validation(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        DeployError::Resolution(message.into())
    }
}

/// Renders an `anyhow` chain on one line, outermost context first.
pub(crate) fn chain_message(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

/// An install that stopped at `failed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("install failed while {failed_at}: {error}")]
pub struct InstallFailure {
    pub failed_at: InstallState,
    #[source]
    pub error: DeployError,
}

impl InstallFailure {
    pub fn new(failed_at: InstallState, error: DeployError) -> Self {
        Self { failed_at, error }
    }
}
