//! Distributed-runtime lifecycle.
//!
//! `EnvironmentController` boots and halts the runtime on the master and
//! grows or shrinks it while live. Whether the runtime is up is always asked
//! of the master itself; `state()` only records what this controller did last.
//!
//! Boot is fire-then-poll: the boot command is started detached, the
//! controller waits a fixed grace interval, then checks convergence
//! synchronously.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClusterError, Result};
use crate::execution::output::{parse_members, runtime_is_active, verification_passed, RuntimeMember};
use crate::infrastructure::RemoteExecutor;
use crate::types::config::{RuntimeCommands, Settings};

use super::manifest::Manifest;
use super::registry::NodeRegistry;


// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// What this controller last did to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvState {
    Uninitialized,
    Running,
    Halted,
}

/// Live status as reported by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "host", rename_all = "snake_case")]
pub enum EnvStatus {
    MasterUndefined,
    Inactive,
    ActiveOnHost(String),
}

/// What a successful boot observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// The manifest as read back from the master.
    pub manifest: String,
    /// Output of the post-boot connectivity check.
    pub connectivity: String,
    /// Live member listing.
    pub members: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    Booted(BootReport),
    /// Already running; nothing was done.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltOutcome {
    Halted,
    /// Nothing was running.
    NotRunning,
}


// ---------------------------------------------------------------------------
// EnvironmentController
// ---------------------------------------------------------------------------

static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

pub struct EnvironmentController {
    state: EnvState,
    commands: RuntimeCommands,
    remote_manifest: String,
    grace: Duration,
    purge_on_halt: bool,
    scratch: PathBuf,
}

impl EnvironmentController {
    pub fn new(settings: &Settings) -> Self {
        let scratch = std::env::temp_dir().join(format!(
            "lamfront-{}-{}-{}",
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed),
            settings.manifest_name
        ));
        EnvironmentController {
            state: EnvState::Uninitialized,
            commands: settings.runtime.clone(),
            remote_manifest: format!("{}/{}", settings.remote_dir, settings.manifest_name),
            grace: Duration::from_millis(settings.boot_grace_ms),
            purge_on_halt: settings.purge_manifest_on_halt,
            scratch,
        }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    /// Path of the manifest on the master.
    pub fn remote_manifest(&self) -> &str {
        &self.remote_manifest
    }

    /// Ask the master whether the runtime is up.
    pub fn is_active(&self, executor: &dyn RemoteExecutor, master: &str) -> bool {
        match executor.run(master, &self.commands.status) {
            Ok(out) => runtime_is_active(&out.output, out.success),
            Err(e) => {
                warn!(master, error = %e, "runtime status query failed");
                false
            }
        }
    }

    pub fn status(&self, executor: &dyn RemoteExecutor, master: Option<&str>) -> EnvStatus {
        match master {
            None => EnvStatus::MasterUndefined,
            Some(m) if self.is_active(executor, m) => EnvStatus::ActiveOnHost(m.to_string()),
            Some(_) => EnvStatus::Inactive,
        }
    }

    /// Boot the runtime on `master` from the registry's active nodes.
    pub fn boot(
        &mut self,
        executor: &dyn RemoteExecutor,
        master: Option<&str>,
        registry: &NodeRegistry,
    ) -> Result<BootOutcome> {
        let master = master.ok_or(ClusterError::MasterUndefined)?;
        if self.is_active(executor, master) {
            info!(master, "runtime already active");
            self.state = EnvState::Running;
            return Ok(BootOutcome::AlreadyActive);
        }

        let manifest = Manifest::from_nodes(registry.nodes());
        if manifest.is_empty() {
            return Err(ClusterError::EmptyManifest);
        }

        std::fs::write(&self.scratch, manifest.render()).map_err(|source| ClusterError::Io {
            path: self.scratch.clone(),
            source,
        })?;
        let result = self.boot_with_manifest(executor, master);
        if let Err(e) = std::fs::remove_file(&self.scratch) {
            warn!(path = %self.scratch.display(), error = %e, "could not remove local manifest");
        }
        let report = result?;

        self.state = EnvState::Running;
        info!(master, hosts = manifest.entries.len(), slots = manifest.total_slots(), "runtime booted");
        Ok(BootOutcome::Booted(report))
    }

    fn boot_with_manifest(&self, executor: &dyn RemoteExecutor, master: &str) -> Result<BootReport> {
        let copied = executor.copy(&self.scratch, master, &self.remote_manifest)?;
        if !copied.success {
            return Err(ClusterError::CopyFailed {
                host: master.to_string(),
                dst: self.remote_manifest.clone(),
                output: copied.output,
            });
        }
        let echoed = executor.run(master, &format!("cat {}", self.remote_manifest))?;

        let verify = executor.run(
            master,
            &format!("{} {}", self.commands.verify, self.remote_manifest),
        )?;
        if !verification_passed(&verify.output, &self.commands.verify_marker) {
            return Err(ClusterError::VerificationFailed {
                host: master.to_string(),
                output: verify.output,
            });
        }

        executor.run_detached(
            master,
            &format!("{} {}", self.commands.boot, self.remote_manifest),
        )?;
        if !self.grace.is_zero() {
            std::thread::sleep(self.grace);
        }

        let connectivity = executor.run(master, &self.commands.ping)?;
        let members = executor.run(master, &self.commands.status)?;
        Ok(BootReport {
            manifest: echoed.output,
            connectivity: connectivity.output,
            members: members.output,
        })
    }

    /// Operator-requested halt. Purges the manifest when configured to.
    pub fn halt(
        &mut self,
        executor: &dyn RemoteExecutor,
        master: Option<&str>,
    ) -> Result<HaltOutcome> {
        let master = master.ok_or(ClusterError::MasterUndefined)?;
        if !self.is_active(executor, master) {
            info!(master, "runtime inactive");
            return Ok(HaltOutcome::NotRunning);
        }
        self.stop(executor, master, self.purge_on_halt)?;
        Ok(HaltOutcome::Halted)
    }

    /// Halt ahead of a membership change. Returns whether it was running,
    /// so the caller knows to reboot afterwards.
    pub fn suspend(&mut self, executor: &dyn RemoteExecutor, master: Option<&str>) -> Result<bool> {
        let Some(master) = master else {
            return Ok(false);
        };
        if !self.is_active(executor, master) {
            return Ok(false);
        }
        self.stop(executor, master, false)?;
        Ok(true)
    }

    /// Reboot after a membership change if `suspend` halted the runtime.
    pub fn resume(
        &mut self,
        executor: &dyn RemoteExecutor,
        master: Option<&str>,
        registry: &NodeRegistry,
        was_running: bool,
    ) -> Result<()> {
        if was_running {
            self.boot(executor, master, registry)?;
        }
        Ok(())
    }

    /// Halt and wipe a runtime left behind by an earlier session.
    pub fn reset_stale(&mut self, executor: &dyn RemoteExecutor, master: &str) -> Result<bool> {
        if !self.is_active(executor, master) {
            return Ok(false);
        }
        info!(master, "previous runtime session found, halting it");
        self.stop(executor, master, true)?;
        Ok(true)
    }

    fn stop(&mut self, executor: &dyn RemoteExecutor, master: &str, purge: bool) -> Result<()> {
        executor.run(master, &self.commands.halt)?;
        if purge {
            executor.run(
                master,
                &format!("{} {}", self.commands.wipe, self.remote_manifest),
            )?;
        }
        self.state = EnvState::Halted;
        info!(master, purge, "runtime halted");
        Ok(())
    }

    /// Nodes of the live runtime, with the runtime's own node numbers. These
    /// differ from registry slots once any slot was left out of the boot.
    pub fn runtime_members(
        &self,
        executor: &dyn RemoteExecutor,
        master: &str,
    ) -> Result<Vec<RuntimeMember>> {
        let out = executor.run(master, &self.commands.status)?;
        Ok(parse_members(&out.output))
    }

    /// Add one host to the live runtime under the next free node number.
    /// Returns the number used.
    pub fn grow(&self, executor: &dyn RemoteExecutor, master: &str, address: &str) -> Result<u32> {
        let id = self
            .runtime_members(executor, master)?
            .iter()
            .map(|m| m.id + 1)
            .max()
            .unwrap_or(0);
        let out = executor.run(master, &format!("{} {} {}", self.commands.grow, id, address))?;
        if !out.success {
            return Err(ClusterError::RuntimeUpdateFailed {
                host: master.to_string(),
                output: out.output,
            });
        }
        info!(master, id, address, "runtime grown");
        Ok(id)
    }

    /// Drop a host from the live runtime by its runtime node number. Returns
    /// that number, or `None` when the runtime does not list the host.
    pub fn shrink(
        &self,
        executor: &dyn RemoteExecutor,
        master: &str,
        address: &str,
    ) -> Result<Option<u32>> {
        let members = self.runtime_members(executor, master)?;
        let Some(member) = members.iter().find(|m| m.address == address) else {
            info!(master, address, "host not in runtime, nothing to shrink");
            return Ok(None);
        };
        let out = executor.run(master, &format!("{} n{}", self.commands.shrink, member.id))?;
        if !out.success {
            return Err(ClusterError::RuntimeUpdateFailed {
                host: master.to_string(),
                output: out.output,
            });
        }
        info!(master, id = member.id, address, "runtime shrunk");
        Ok(Some(member.id))
    }

    /// Live member listing from the master.
    pub fn members(&self, executor: &dyn RemoteExecutor, master: &str) -> Result<String> {
        Ok(executor.run(master, &self.commands.status)?.output)
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
