//! Remote-shell executor.
//!
//! `RshCommandBuilder` turns executor calls into local command lines for the
//! configured remote shell, copy program and probe. `RshExecutor` hands those
//! lines to a `CommandRunner`. Swapping `rsh`/`rcp` for `ssh`/`scp` is a
//! settings change only.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::types::config::Settings;

use super::runner::{CommandOutput, CommandRunner};
use super::RemoteExecutor;

// ---------------------------------------------------------------------------
// Command builder
// ---------------------------------------------------------------------------

/// Builds local command strings without executing them.
#[derive(Debug, Clone)]
pub struct RshCommandBuilder {
    shell: String,
    copy: String,
    probe: String,
}

impl RshCommandBuilder {
    pub fn new(settings: &Settings) -> Self {
        RshCommandBuilder {
            shell: settings.remote_shell.clone(),
            copy: settings.remote_copy.clone(),
            probe: settings.probe_command.clone(),
        }
    }

    /// `<shell> <host> '<command>'`. The command is quoted so globs and
    /// redirections are expanded on the remote host, not locally.
    pub fn run(&self, host: &str, command: &str) -> String {
        format!("{} {} {}", self.shell, shell_escape(host), shell_escape(command))
    }

    /// `nohup <shell> <host> '<command>' > /dev/null 2>&1 &`
    pub fn run_detached(&self, host: &str, command: &str) -> String {
        format!("nohup {} > /dev/null 2>&1 &", self.run(host, command))
    }

    /// Probe template with `{host}` substituted, output discarded.
    pub fn probe(&self, host: &str) -> String {
        format!(
            "{} > /dev/null 2>&1",
            self.probe.replace("{host}", &shell_escape(host))
        )
    }

    /// `<copy> <src> <host>:<dst>`
    pub fn copy(&self, src: &Path, host: &str, dst: &str) -> String {
        format!(
            "{} {} {}",
            self.copy,
            shell_escape(&src.to_string_lossy()),
            shell_escape(&format!("{}:{}", host, dst))
        )
    }
}

/// Escape a string for safe use in a shell command.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '%' | ':' | '@')
    }) {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

// ---------------------------------------------------------------------------
// RshExecutor
// ---------------------------------------------------------------------------

/// `RemoteExecutor` backed by local invocations of the remote-shell tools.
pub struct RshExecutor {
    builder: RshCommandBuilder,
    runner: Box<dyn CommandRunner>,
}

impl RshExecutor {
    pub fn new(settings: &Settings, runner: Box<dyn CommandRunner>) -> Self {
        RshExecutor {
            builder: RshCommandBuilder::new(settings),
            runner,
        }
    }
}

impl RemoteExecutor for RshExecutor {
    fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        let cmd = self.builder.run(host, command);
        debug!(host, command, "remote run");
        self.runner.run(&cmd)
    }

    fn run_detached(&self, host: &str, command: &str) -> Result<()> {
        let cmd = self.builder.run_detached(host, command);
        debug!(host, command, "remote run (detached)");
        self.runner.spawn_detached(&cmd)
    }

    fn probe(&self, host: &str) -> bool {
        let cmd = self.builder.probe(host);
        match self.runner.run(&cmd) {
            Ok(out) => out.success,
            Err(e) => {
                debug!(host, error = %e, "probe could not run");
                false
            }
        }
    }

    fn copy(&self, src: &Path, host: &str, dst: &str) -> Result<CommandOutput> {
        let cmd = self.builder.copy(src, host, dst);
        debug!(host, src = %src.display(), dst, "remote copy");
        self.runner.run(&cmd)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::settings::default_settings;
    use crate::infrastructure::runner::MockRunner;
    use std::rc::Rc;

    /// Lets a test keep reading the runner after the executor owns it.
    struct Shared(Rc<MockRunner>);

    impl CommandRunner for Shared {
        fn run(&self, cmd: &str) -> Result<CommandOutput> {
            self.0.run(cmd)
        }
        fn spawn_detached(&self, cmd: &str) -> Result<()> {
            self.0.spawn_detached(cmd)
        }
    }

    fn executor(responses: Vec<CommandOutput>) -> (RshExecutor, Rc<MockRunner>) {
        let runner = Rc::new(MockRunner::with_responses(responses));
        let exec = RshExecutor::new(&default_settings(), Box::new(Shared(runner.clone())));
        (exec, runner)
    }

    #[test]
    fn builder_formats() {
        let b = RshCommandBuilder::new(&default_settings());
        assert_eq!(b.run("alfa00", "lamnodes"), "rsh alfa00 lamnodes");
        assert_eq!(
            b.run_detached("alfa00", "lamboot -v lamhosts"),
            "nohup rsh alfa00 'lamboot -v lamhosts' > /dev/null 2>&1 &"
        );
        assert_eq!(b.run("alfa01", "rm -f /home/op/pi*"), "rsh alfa01 'rm -f /home/op/pi*'");
        assert_eq!(b.probe("alfa03"), "ping -c 1 alfa03 > /dev/null 2>&1");
        assert_eq!(
            b.copy(Path::new("/tmp/pi.c"), "alfa00", "/home/op/pi.c"),
            "rcp /tmp/pi.c alfa00:/home/op/pi.c"
        );
    }

    #[test]
    fn builder_uses_configured_tools() {
        let mut s = default_settings();
        s.remote_shell = "ssh -o BatchMode=yes".into();
        s.remote_copy = "scp -q".into();
        let b = RshCommandBuilder::new(&s);
        assert_eq!(b.run("h", "uptime"), "ssh -o BatchMode=yes h uptime");
        assert_eq!(b.run("h", "mpirun -np 2 pi"), "ssh -o BatchMode=yes h 'mpirun -np 2 pi'");
        assert_eq!(b.copy(Path::new("a"), "h", "b"), "scp -q a h:b");
    }

    #[test]
    fn shell_escape_quotes_specials() {
        assert_eq!(shell_escape("plain"), "plain");
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("my file.c"), "'my file.c'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn run_goes_through_runner() {
        let (exec, runner) = executor(vec![CommandOutput::ok("n0 alfa00")]);
        let out = exec.run("alfa00", "lamnodes").unwrap();
        assert_eq!(out.output, "n0 alfa00");
        assert_eq!(runner.executed_commands(), vec!["rsh alfa00 lamnodes"]);
    }

    #[test]
    fn probe_maps_exit_status() {
        let (exec, _) = executor(vec![CommandOutput::ok(""), CommandOutput::failed("")]);
        assert!(exec.probe("up"));
        assert!(!exec.probe("down"));
    }

    #[test]
    fn detached_does_not_block_on_runner_output() {
        let (exec, runner) = executor(Vec::new());
        exec.run_detached("alfa00", "lamboot -v lamhosts").unwrap();
        assert!(runner.executed_commands().is_empty());
        assert_eq!(runner.detached_commands().len(), 1);
    }
}
