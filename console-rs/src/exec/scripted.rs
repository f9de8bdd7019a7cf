//! Scripted execution double for tests
//!
//! Maps command substrings to canned outputs and records every
//! invocation in order, so tests can assert both results and the exact
//! sequence of remote calls.

use super::{ExecOpts, ExecOutput, RemoteShell};
use crate::error::{ConsoleError, Result};
use crate::settings::target::Target;
use async_trait::async_trait;
use std::sync::Mutex;

struct Rule {
    needle: String,
    output: ExecOutput,
}

#[derive(Default)]
pub struct ScriptedShell {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    timeouts: Mutex<Vec<std::time::Duration>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `output` for any command containing `needle`.
    ///
    /// Rules are matched in registration order, first match wins.
    pub fn on(self, needle: impl Into<String>, output: ExecOutput) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.into(),
            output,
        });
        self
    }

    pub fn add_rule(&self, needle: impl Into<String>, output: ExecOutput) {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.into(),
            output,
        });
    }

    /// All commands executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Timeouts of the `exec_command`/`exec_setup` calls, in order.
    pub fn exec_timeouts(&self) -> Vec<std::time::Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    fn dispatch(&self, command: &str) -> ExecOutput {
        self.calls.lock().unwrap().push(command.to_string());
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|r| command.contains(&r.needle))
            .map(|r| r.output.clone())
            .unwrap_or_else(|| ExecOutput::failed(127, format!("unscripted command: {command}")))
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn exec_command(
        &self,
        command: &str,
        _target: &Target,
        opts: ExecOpts,
    ) -> Result<ExecOutput> {
        self.timeouts.lock().unwrap().push(opts.timeout);
        Ok(self.dispatch(command))
    }

    async fn exec_setup(
        &self,
        subcommand: &str,
        _target: &Target,
        opts: ExecOpts,
    ) -> Result<ExecOutput> {
        self.timeouts.lock().unwrap().push(opts.timeout);
        Ok(self.dispatch(&format!("setup {subcommand}")))
    }

    async fn ping(&self, container: &str) -> Result<String> {
        let output = self.dispatch(&format!("ping {container}"));
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(ConsoleError::Exec(output.stderr))
        }
    }

    async fn write_file(&self, path: &str, content: &str, _target: &Target) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("write {path} ({} bytes)", content.len()));
        Ok(())
    }
}
