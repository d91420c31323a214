//! Mock remote executor for testing.
//!
//! Simulates a small cluster: which hosts answer probes, files copied to
//! each host, and a runtime daemon on the master that understands the
//! default command vocabulary (`lamnodes`, `recon`, `lamboot`, `lamhalt`,
//! `lamgrow`, `lamshrink`). Runtime members carry their own node numbers:
//! boot numbers them in manifest order, `lamgrow -n <id>` uses the given
//! number and `lamshrink n<id>` removes by number, refusing unknown or
//! duplicate ids like the real tools. Canned responses override the simulation for
//! commands containing a given needle. Every call is recorded.
//!
//! The mock is a cheap handle over shared state, so a test can keep a clone
//! while the session owns the boxed executor.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::error::Result;

use super::runner::CommandOutput;
use super::RemoteExecutor;

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Run { host: String, command: String },
    Detached { host: String, command: String },
    Probe { host: String },
    Copy { src: String, host: String, dst: String },
}

#[derive(Debug, Default)]
struct MockState {
    reachable: HashSet<String>,
    runtime_active: bool,
    verification_fails: bool,
    members: Vec<(u32, String)>,
    files: HashMap<(String, String), String>,
    responses: Vec<(Option<String>, String, CommandOutput)>,
    calls: Vec<MockCall>,
}

/// A test-double cluster.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    state: Rc<RefCell<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    /// Create a mock where the given hosts answer probes.
    pub fn with_reachable(hosts: &[&str]) -> Self {
        let mock = MockExecutor::new();
        for host in hosts {
            mock.set_reachable(host, true);
        }
        mock
    }

    pub fn set_reachable(&self, host: &str, reachable: bool) {
        let mut state = self.state.borrow_mut();
        if reachable {
            state.reachable.insert(host.to_string());
        } else {
            state.reachable.remove(host);
        }
    }

    /// Pretend a runtime is (or is not) already running on the master.
    pub fn set_runtime_active(&self, active: bool) {
        self.state.borrow_mut().runtime_active = active;
    }

    pub fn runtime_active(&self) -> bool {
        self.state.borrow().runtime_active
    }

    /// Make the pre-boot verification report failure.
    pub fn fail_verification(&self) {
        self.state.borrow_mut().verification_fails = true;
    }

    /// Addresses of the simulated runtime members, in boot/grow order.
    pub fn members(&self) -> Vec<String> {
        self.state
            .borrow()
            .members
            .iter()
            .map(|(_, address)| address.clone())
            .collect()
    }

    /// Runtime node numbers paired with addresses.
    pub fn runtime_nodes(&self) -> Vec<(u32, String)> {
        self.state.borrow().members.clone()
    }

    /// Answer any `run` whose command contains `needle` with `output`.
    /// Earlier registrations win.
    pub fn respond(&self, needle: &str, output: CommandOutput) {
        self.state
            .borrow_mut()
            .responses
            .push((None, needle.to_string(), output));
    }

    /// Like `respond`, but only for commands run on `host`.
    pub fn respond_on(&self, host: &str, needle: &str, output: CommandOutput) {
        self.state
            .borrow_mut()
            .responses
            .push((Some(host.to_string()), needle.to_string(), output));
    }

    /// Content of a file copied to `host` at `dst`, if any.
    pub fn copied(&self, host: &str, dst: &str) -> Option<String> {
        self.state
            .borrow()
            .files
            .get(&(host.to_string(), dst.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    /// Run and detached commands as `"host: command"`, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Run { host, command } | MockCall::Detached { host, command } => {
                    Some(format!("{}: {}", host, command))
                }
                _ => None,
            })
            .collect()
    }

    /// Commands run on one host, without the host prefix.
    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Run { host: h, command } | MockCall::Detached { host: h, command }
                    if h == host =>
                {
                    Some(command.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Whether any recorded run/detached command contains `needle`.
    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn simulate(state: &mut MockState, host: &str, command: &str) -> CommandOutput {
        let verb = command.split_whitespace().next().unwrap_or("");
        match verb {
            "lamnodes" => {
                if state.runtime_active {
                    let listing: Vec<String> = state
                        .members
                        .iter()
                        .map(|(id, m)| format!("n{}\t{}:1:origin,this_node", id, m))
                        .collect();
                    CommandOutput::ok(&listing.join("\n"))
                } else {
                    CommandOutput::failed(&format!(
                        "-----------------------------------------------------------------------------\n\
                         It seems that there is no lamd running on the host {}.",
                        host
                    ))
                }
            }
            "recon" => {
                if state.verification_fails {
                    CommandOutput::failed("recon: ERROR: LAM/MPI unexpectedly received the following on stderr")
                } else {
                    CommandOutput::ok("Woo hoo!\n\nrecon has completed successfully.")
                }
            }
            "lamhalt" => {
                state.runtime_active = false;
                state.members.clear();
                CommandOutput::ok("LAM 7.1.4/MPI 2 C++/ROMIO - Indiana University\n\nLAM halted")
            }
            "lamgrow" => {
                let words: Vec<&str> = command.split_whitespace().collect();
                let id = words
                    .iter()
                    .position(|w| *w == "-n")
                    .and_then(|i| words.get(i + 1))
                    .and_then(|w| w.parse::<u32>().ok());
                match (id, words.last()) {
                    (Some(id), Some(addr)) if !state.members.iter().any(|(m, _)| *m == id) => {
                        state.members.push((id, addr.to_string()));
                        CommandOutput::ok("")
                    }
                    _ => CommandOutput::failed(&format!("lamgrow: invalid node number in '{}'", command)),
                }
            }
            "lamshrink" => {
                let id = command
                    .split_whitespace()
                    .nth(1)
                    .and_then(|w| w.strip_prefix('n'))
                    .and_then(|w| w.parse::<u32>().ok());
                match id.and_then(|id| state.members.iter().position(|(m, _)| *m == id)) {
                    Some(pos) => {
                        state.members.remove(pos);
                        CommandOutput::ok("")
                    }
                    None => CommandOutput::failed(&format!("lamshrink: invalid node in '{}'", command)),
                }
            }
            "cat" => {
                let path = command.split_whitespace().nth(1).unwrap_or("");
                let content = state
                    .files
                    .get(&(host.to_string(), path.to_string()))
                    .cloned()
                    .unwrap_or_default();
                CommandOutput::ok(&content)
            }
            _ => CommandOutput::ok(""),
        }
    }
}

impl RemoteExecutor for MockExecutor {
    fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push(MockCall::Run {
            host: host.to_string(),
            command: command.to_string(),
        });
        if let Some((_, _, out)) = state.responses.iter().find(|(on, needle, _)| {
            on.as_deref().map_or(true, |h| h == host) && command.contains(needle.as_str())
        }) {
            return Ok(out.clone());
        }
        Ok(MockExecutor::simulate(&mut state, host, command))
    }

    fn run_detached(&self, host: &str, command: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(MockCall::Detached {
            host: host.to_string(),
            command: command.to_string(),
        });
        if command.starts_with("lamboot") {
            let manifest = command.split_whitespace().last().unwrap_or("").to_string();
            let content = state
                .files
                .get(&(host.to_string(), manifest))
                .cloned()
                .unwrap_or_default();
            state.members = content
                .lines()
                .filter_map(|l| l.split_whitespace().next())
                .zip(0u32..)
                .map(|(addr, id)| (id, addr.to_string()))
                .collect();
            state.runtime_active = true;
        }
        Ok(())
    }

    fn probe(&self, host: &str) -> bool {
        let mut state = self.state.borrow_mut();
        state.calls.push(MockCall::Probe {
            host: host.to_string(),
        });
        state.reachable.contains(host)
    }

    fn copy(&self, src: &Path, host: &str, dst: &str) -> Result<CommandOutput> {
        let content = std::fs::read_to_string(src).unwrap_or_default();
        let mut state = self.state.borrow_mut();
        state.calls.push(MockCall::Copy {
            src: src.to_string_lossy().to_string(),
            host: host.to_string(),
            dst: dst.to_string(),
        });
        state
            .files
            .insert((host.to_string(), dst.to_string()), content);
        Ok(CommandOutput::ok(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_follows_reachable_set() {
        let mock = MockExecutor::with_reachable(&["a"]);
        assert!(mock.probe("a"));
        assert!(!mock.probe("b"));
        mock.set_reachable("b", true);
        assert!(mock.probe("b"));
        mock.set_reachable("a", false);
        assert!(!mock.probe("a"));
    }

    #[test]
    fn runtime_lifecycle() {
        let mock = MockExecutor::new();
        let out = mock.run("m", "lamnodes").unwrap();
        assert!(out.output.starts_with('-'));

        mock.run_detached("m", "lamboot -v lamhosts").unwrap();
        assert!(mock.runtime_active());
        assert!(!mock.run("m", "lamnodes").unwrap().output.starts_with('-'));

        mock.run("m", "lamhalt -v").unwrap();
        assert!(!mock.runtime_active());
    }

    #[test]
    fn boot_reads_members_from_copied_manifest() {
        let dir = std::env::temp_dir().join("lamfront-mock-manifest");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lamhosts");
        std::fs::write(&path, "a slots=1\nb slots=2\n").unwrap();

        let mock = MockExecutor::new();
        mock.copy(&path, "a", "/home/op/lamhosts").unwrap();
        assert_eq!(
            mock.copied("a", "/home/op/lamhosts").unwrap(),
            "a slots=1\nb slots=2\n"
        );
        mock.run_detached("a", "lamboot -v /home/op/lamhosts").unwrap();
        assert_eq!(mock.members(), vec!["a", "b"]);

        mock.run("a", "lamgrow -n 2 c").unwrap();
        mock.run("a", "lamshrink n0").unwrap();
        assert_eq!(mock.members(), vec!["b", "c"]);
        assert_eq!(mock.runtime_nodes(), vec![(1, "b".to_string()), (2, "c".to_string())]);

        // Numbers are not positions: n0 is gone, a reused id is refused.
        assert!(!mock.run("a", "lamshrink n0").unwrap().success);
        assert!(!mock.run("a", "lamgrow -n 1 d").unwrap().success);
        assert_eq!(mock.members(), vec!["b", "c"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn canned_responses_win() {
        let mock = MockExecutor::new();
        mock.respond("mpicc", CommandOutput::ok("pi.c:4: warning: unused variable"));
        let out = mock.run("a", "mpicc -o pi pi.c -lm").unwrap();
        assert!(out.output.contains("warning"));
        assert_eq!(mock.commands(), vec!["a: mpicc -o pi pi.c -lm"]);
    }

    #[test]
    fn host_scoped_responses() {
        let mock = MockExecutor::new();
        mock.respond_on("b", "mpicc", CommandOutput::ok("error: boom"));
        assert_eq!(mock.run("a", "mpicc x.c").unwrap().output, "");
        assert_eq!(mock.run("b", "mpicc x.c").unwrap().output, "error: boom");
    }

    #[test]
    fn verification_can_fail() {
        let mock = MockExecutor::new();
        assert!(mock.run("m", "recon -v lamhosts").unwrap().output.contains("Woo hoo!"));
        mock.fail_verification();
        assert!(!mock.run("m", "recon -v lamhosts").unwrap().success);
    }

    #[test]
    fn clones_share_state() {
        let mock = MockExecutor::new();
        let handle = mock.clone();
        mock.run("x", "uptime").unwrap();
        assert!(handle.ran("uptime"));
        assert_eq!(handle.commands_on("x"), vec!["uptime"]);
        handle.clear_calls();
        assert!(mock.calls().is_empty());
    }
}
