//! Docker-backed execution collaborator
//!
//! Thin wrapper around `docker exec`; the command string itself is
//! handed to `sh -c` inside the container. Every call carries an
//! explicit timeout, and a timeout is a reported failure, never a hang.

use super::{ExecOpts, ExecOutput, RemoteShell};
use crate::error::{ConsoleError, Result};
use crate::settings::target::Target;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

pub struct DockerShell;

impl DockerShell {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, args: &[&str], timeout: std::time::Duration) -> Result<ExecOutput> {
        debug!("docker {}", args.join(" "));

        let output = tokio::time::timeout(timeout, Command::new("docker").args(args).output())
            .await
            .map_err(|_| {
                ConsoleError::Exec(format!("command timed out after {}s", timeout.as_secs()))
            })??;

        Ok(ExecOutput {
            returncode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for DockerShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteShell for DockerShell {
    async fn exec_command(
        &self,
        command: &str,
        target: &Target,
        opts: ExecOpts,
    ) -> Result<ExecOutput> {
        self.run(
            &["exec", &target.container, "sh", "-c", command],
            opts.timeout,
        )
        .await
    }

    async fn exec_setup(
        &self,
        subcommand: &str,
        target: &Target,
        opts: ExecOpts,
    ) -> Result<ExecOutput> {
        let command = format!("setup {subcommand}");
        self.run(
            &["exec", &target.container, "sh", "-c", &command],
            opts.timeout,
        )
        .await
    }

    async fn ping(&self, container: &str) -> Result<String> {
        let output = self
            .run(
                &["inspect", "-f", "{{.State.Running}}", container],
                std::time::Duration::from_secs(5),
            )
            .await?;

        if output.success() && output.stdout.trim() == "true" {
            Ok("running".to_string())
        } else {
            Err(ConsoleError::Exec(format!(
                "container {container} is not running"
            )))
        }
    }

    async fn write_file(&self, path: &str, content: &str, target: &Target) -> Result<()> {
        // Content goes over stdin-less sh; quote both sides
        let command = format!(
            "printf %s {} > {}",
            crate::utils::shell::quote(content),
            crate::utils::shell::quote(path)
        );
        let output = self
            .exec_command(&command, target, ExecOpts::default())
            .await?;

        if output.success() {
            Ok(())
        } else {
            Err(ConsoleError::Exec(format!(
                "failed to write {path}: {}",
                output.stderr.trim()
            )))
        }
    }
}
