//! Subprocess execution for the native installer and database client.
//!
//! Commands are shell templates with `%(name)s` placeholders. Placeholder
//! values are shell-quoted path arguments; anything secret travels in the
//! child's environment so it never shows up in a process listing.
//!
//! Each run gets its own process group, so a timeout takes down every
//! process the template started, not just the shell.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::process::Command;

use crate::runtime::block_on;

/// Maximum bytes of combined output kept per run.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct ProcessRequest {
    pub template: String,
    pub path_args: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ProcessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRequest")
            .field("template", &self.template)
            .field("path_args", &self.path_args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

impl ProcessRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path_args: BTreeMap::new(),
            env: BTreeMap::new(),
            timeout: Duration::from_secs(60),
            working_dir: None,
        }
    }

    pub fn with_path_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_args.insert(name.into(), value.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Expand `%(name)s` placeholders with shell-quoted path arguments.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("%(") {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find(")s")
                .ok_or_else(|| anyhow::anyhow!("Unterminated placeholder in '{}'", self.template))?;
            let name = &after[..end];
            let value = self.path_args.get(name).ok_or_else(|| {
                anyhow::anyhow!("No value for placeholder '{}' in '{}'", name, self.template)
            })?;
            rendered.push_str(&shell_quote(value));
            rest = &after[end + 2..];
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Stdout followed by stderr, truncated.
    pub output: String,
}

pub trait ProcessRunner: Send + Sync {
    /// Run to completion. Spawn failures and timeouts are errors; a non-zero
    /// exit is a completed run with `success == false`.
    fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput>;
}

/// Runs templates through `/bin/sh -c`.
#[derive(Debug, Clone)]
pub struct ShellProcessRunner {
    shell: PathBuf,
}

impl ShellProcessRunner {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }

    pub fn with_shell(shell: PathBuf) -> Self {
        Self { shell }
    }

    async fn run_async(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput> {
        let script = request.render()?;
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.shell.display()))?;

        let pid = child.id();

        // On timeout the shell is dropped and killed; its group follows.
        let output = match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for process")?,
            Err(_) => {
                kill_process_group(pid);
                anyhow::bail!("Process timed out after {:?}", request.timeout)
            }
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        combined.truncate(MAX_OUTPUT_BYTES);

        tracing::debug!(
            exit_code = ?output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "process finished"
        );

        Ok(ProcessOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for ShellProcessRunner {
    fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput> {
        block_on(self.run_async(request))?
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) on a process group we created touches no memory.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        let error = std::io::Error::last_os_error();
        if error.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, error = %error, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Quote for POSIX sh using single quotes.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}
