//! Command runner abstraction for executing local shell commands.
//!
//! `CommandRunner` is the trait the remote executor uses to launch the
//! remote-shell and copy programs. `ShellRunner` is the production
//! implementation that spawns `sh -c`. `MockRunner` is the test double that
//! records calls and returns preset responses.

use std::cell::RefCell;
use std::process::{Command, Stdio};

use crate::error::{ClusterError, Result};

/// Captured result of one command: merged stdout/stderr plus success flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub output: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(output: &str) -> Self {
        CommandOutput {
            output: output.to_string(),
            success: true,
        }
    }

    pub fn failed(output: &str) -> Self {
        CommandOutput {
            output: output.to_string(),
            success: false,
        }
    }
}

/// Trait for executing shell command strings.
pub trait CommandRunner {
    /// Run to completion and capture output.
    fn run(&self, cmd: &str) -> Result<CommandOutput>;

    /// Start without waiting for completion. The command backgrounds itself
    /// with a trailing `&`; the shell that launches it is reaped here.
    fn spawn_detached(&self, cmd: &str) -> Result<()>;
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ClusterError::Spawn {
                command: cmd.to_string(),
                source,
            })?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CommandOutput {
            output: text.trim_end().to_string(),
            success: output.status.success(),
        })
    }

    fn spawn_detached(&self, cmd: &str) -> Result<()> {
        Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|source| ClusterError::Spawn {
                command: cmd.to_string(),
                source,
            })
    }
}

/// Test-double runner that records commands and returns pre-configured responses.
pub struct MockRunner {
    responses: RefCell<Vec<CommandOutput>>,
    commands: RefCell<Vec<String>>,
    detached: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<CommandOutput>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            commands: RefCell::new(Vec::new()),
            detached: RefCell::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        MockRunner::with_responses(Vec::new())
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn detached_commands(&self) -> Vec<String> {
        self.detached.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput> {
        self.commands.borrow_mut().push(cmd.to_string());
        let mut responses = self.responses.borrow_mut();
        Ok(responses.pop().unwrap_or_else(|| CommandOutput::ok("")))
    }

    fn spawn_detached(&self, cmd: &str) -> Result<()> {
        self.detached.borrow_mut().push(cmd.to_string());
        Ok(())
    }
}
