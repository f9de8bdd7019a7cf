//! Remote execution facade
//!
//! The core never spawns processes directly; it talks to a collaborator
//! implementing [`RemoteShell`]. Commands are passed as already-quoted
//! strings; any value interpolated from untrusted input must have passed
//! `utils::validate` or `utils::shell::quote` first.

use crate::error::Result;
use crate::settings::target::Target;
use async_trait::async_trait;
use std::time::Duration;

pub mod docker;
pub mod scripted;

pub use docker::DockerShell;
pub use scripted::ScriptedShell;

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutput {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            returncode: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(returncode: i32, stderr: impl Into<String>) -> Self {
        Self {
            returncode,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.returncode == 0
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Copy)]
pub struct ExecOpts {
    pub timeout: Duration,
}

impl Default for ExecOpts {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl ExecOpts {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Command execution against a resolved target.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a shell command inside the target's container.
    async fn exec_command(&self, command: &str, target: &Target, opts: ExecOpts)
        -> Result<ExecOutput>;

    /// Run a subcommand of the appliance's setup utility.
    async fn exec_setup(&self, subcommand: &str, target: &Target, opts: ExecOpts)
        -> Result<ExecOutput>;

    /// Liveness probe for a container.
    async fn ping(&self, container: &str) -> Result<String>;

    /// Write a file inside the target's container.
    async fn write_file(&self, path: &str, content: &str, target: &Target) -> Result<()>;
}
