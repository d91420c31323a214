//! Cluster session: the single owner of all mutable cluster state.
//!
//! `ClusterSession` holds the registry, the master, the runtime controller,
//! the current job and the executor, and implements every operator action
//! that changes membership. Those actions halt the runtime first when it is
//! live, apply the change, and boot it again before returning, so a change
//! is never left half applied.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::data::hostlist;
use crate::data::settings::default_settings;
use crate::error::{ClusterError, Result};
use crate::execution::pipeline::Job;
use crate::infrastructure::RemoteExecutor;
use crate::types::config::Settings;
use crate::types::node::{Node, SelectionTarget};

use super::elector;
use super::environment::{BootOutcome, EnvState, EnvStatus, EnvironmentController, HaltOutcome};
use super::registry::NodeRegistry;


/// Serializable view of the session, for `--status-json`.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub master: Option<String>,
    pub environment: EnvStatus,
    pub job: Option<String>,
}


pub struct ClusterSession {
    pub(crate) settings: Settings,
    pub(crate) registry: NodeRegistry,
    pub(crate) master: Option<String>,
    pub(crate) environment: EnvironmentController,
    pub(crate) job: Job,
    pub(crate) executor: Box<dyn RemoteExecutor>,
}

impl fmt::Debug for ClusterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSession")
            .field("registry", &self.registry)
            .field("master", &self.master)
            .field("environment", &self.environment.state())
            .field("job", &self.job)
            .finish()
    }
}

impl ClusterSession {
    /// Probe `addresses` in order, build the registry and elect a master.
    pub fn from_addresses(
        settings: Settings,
        executor: Box<dyn RemoteExecutor>,
        addresses: &[String],
    ) -> Self {
        let mut registry = NodeRegistry::probe_all(executor.as_ref(), addresses);
        let master = elector::elect(&mut registry);
        if master.is_none() {
            warn!("no reachable node, master undefined");
        }
        let environment = EnvironmentController::new(&settings);
        ClusterSession {
            settings,
            registry,
            master,
            environment,
            job: Job::default(),
            executor,
        }
    }

    /// Load the well-known default hosts. Never fails.
    pub fn load_default(settings: Settings, executor: Box<dyn RemoteExecutor>) -> Self {
        let mut hosts = settings.default_hosts.clone();
        if hosts.is_empty() {
            hosts = default_settings().default_hosts;
        }
        info!(hosts = hosts.len(), "using default host set");
        ClusterSession::from_addresses(settings, executor, &hosts)
    }

    /// Load hosts from a host-list file. Errors here are fatal.
    pub fn load_from_file(
        settings: Settings,
        executor: Box<dyn RemoteExecutor>,
        path: &Path,
    ) -> Result<Self> {
        let hosts = hostlist::load(path)?;
        info!(path = %path.display(), hosts = hosts.len(), "loaded host list");
        Ok(ClusterSession::from_addresses(settings, executor, &hosts))
    }

    // -- Accessors --

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn master(&self) -> Option<&str> {
        self.master.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn environment_state(&self) -> EnvState {
        self.environment.state()
    }

    pub fn executor(&self) -> &dyn RemoteExecutor {
        self.executor.as_ref()
    }

    // -- Runtime lifecycle --

    pub fn status(&self) -> EnvStatus {
        self.environment
            .status(self.executor.as_ref(), self.master.as_deref())
    }

    pub fn boot(&mut self) -> Result<BootOutcome> {
        self.environment
            .boot(self.executor.as_ref(), self.master.as_deref(), &self.registry)
    }

    pub fn halt(&mut self) -> Result<HaltOutcome> {
        self.environment
            .halt(self.executor.as_ref(), self.master.as_deref())
    }

    /// Halt a runtime left over from an earlier session. Returns whether one
    /// was found.
    pub fn reset_stale_environment(&mut self) -> Result<bool> {
        match self.master.as_deref() {
            Some(master) => self.environment.reset_stale(self.executor.as_ref(), master),
            None => Ok(false),
        }
    }

    pub fn members(&self) -> Result<String> {
        let master = self.master.as_deref().ok_or(ClusterError::MasterUndefined)?;
        self.environment.members(self.executor.as_ref(), master)
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.registry.nodes().to_vec(),
            master: self.master.clone(),
            environment: self.status(),
            job: self.job.name.clone(),
        }
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    fn suspend(&mut self) -> Result<bool> {
        self.environment
            .suspend(self.executor.as_ref(), self.master.as_deref())
    }

    /// Reboot after a membership change. The change itself already happened,
    /// so a failed reboot is reported but does not fail the operation.
    fn resume(&mut self, was_running: bool) {
        if let Err(e) = self.environment.resume(
            self.executor.as_ref(),
            self.master.as_deref(),
            &self.registry,
            was_running,
        ) {
            error!(error = %e, "runtime could not be restarted after membership change");
        }
    }

    // -- Membership --

    /// Append a reachable host. Grows a live runtime in place.
    pub fn add_node(&mut self, address: &str) -> Result<usize> {
        let address = address.trim();
        if !self.executor.probe(address) {
            return Err(ClusterError::Unreachable(address.to_string()));
        }
        let index = self.registry.add(address)?;
        info!(slot = index, address, "node added");

        let Some(master) = self.master.clone() else {
            self.master = elector::elect(&mut self.registry);
            return Ok(index);
        };
        if self.environment.is_active(self.executor.as_ref(), &master) {
            if let Err(e) = self.environment.grow(self.executor.as_ref(), &master, address) {
                if let Err(undo) = self.registry.remove(index) {
                    error!(slot = index, error = %undo, "could not undo node add");
                }
                return Err(e);
            }
        }
        Ok(index)
    }

    /// Remove a node, re-electing if it was the master.
    pub fn remove_node(&mut self, index: usize) -> Result<Node> {
        let target = self.registry.node(index)?.address.clone();
        if self.registry.len() == 1 {
            return Err(ClusterError::LastNode);
        }
        let was_master = self.master.as_deref() == Some(target.as_str());

        let was_running = self.suspend()?;
        let removed = self.registry.remove(index)?;
        info!(slot = index, address = %removed.address, "node removed");

        if was_master && !self.registry.contains(&target) {
            self.master = elector::elect(&mut self.registry);
        }
        self.resume(was_running);
        Ok(removed)
    }

    /// Exchange two slots. Elects a master afterwards if none was defined.
    pub fn swap_nodes(&mut self, a: usize, b: usize) -> Result<()> {
        self.registry.node(a)?;
        self.registry.node(b)?;
        let had_master = self.master.is_some();

        let was_running = self.suspend()?;
        self.registry.swap(a, b)?;
        info!(a, b, "nodes swapped");
        self.resume(was_running);

        if !had_master {
            self.master = elector::elect(&mut self.registry);
        }
        Ok(())
    }

    /// Flip selection of one node, or of every node with `*`.
    pub fn toggle_selection(&mut self, target: SelectionTarget) -> Result<()> {
        match target {
            SelectionTarget::One(index) => self.toggle_one(index),
            SelectionTarget::All => {
                for index in 0..self.registry.len() {
                    if let Err(e) = self.toggle_one(index) {
                        warn!(slot = index, error = %e, "toggle skipped");
                    }
                }
                Ok(())
            }
        }
    }

    fn toggle_one(&mut self, index: usize) -> Result<()> {
        let node = self.registry.node(index)?.clone();
        if self.master.as_deref() == Some(node.address.as_str()) {
            return self.toggle_master(index, &node.address);
        }

        let reachable = self.executor.probe(&node.address);
        if let Some(n) = self.registry.get_mut(index) {
            n.reachable = reachable;
        }
        if !reachable {
            return Err(ClusterError::Offline(node.address));
        }
        let selected = !node.selected;
        if let Some(n) = self.registry.get_mut(index) {
            n.selected = selected;
        }
        info!(slot = %node.slot_id, address = %node.address, selected, "selection toggled");

        let Some(master) = self.master.clone() else {
            if selected {
                self.master = Some(node.address.clone());
                info!(master = %node.address, "master assigned");
            }
            return Ok(());
        };
        if !self.environment.is_active(self.executor.as_ref(), &master) {
            return Ok(());
        }

        // A host listed in several slots is one runtime node with several
        // process slots; only a reboot can change its slot count.
        let occurrences = self
            .registry
            .nodes()
            .iter()
            .filter(|n| n.address == node.address)
            .count();
        if occurrences > 1 {
            let was_running = self.suspend()?;
            self.resume(was_running);
            return Ok(());
        }

        let executor = self.executor.as_ref();
        let updated = if selected {
            self.environment.grow(executor, &master, &node.address).map(|_| ())
        } else {
            self.environment.shrink(executor, &master, &node.address).map(|_| ())
        };
        if let Err(e) = updated {
            if let Some(n) = self.registry.get_mut(index) {
                n.selected = node.selected;
            }
            return Err(e);
        }
        let members = self.environment.members(executor, &master)?;
        info!(members = %members, "runtime members");
        Ok(())
    }

    /// Toggling the master hands the role to the first other reachable and
    /// selected node; with no candidate the master stays and stays selected.
    fn toggle_master(&mut self, index: usize, master: &str) -> Result<()> {
        let was_running = self.suspend()?;
        if let Some(n) = self.registry.get_mut(index) {
            n.selected = !n.selected;
        }
        if let Some(next) = elector::successor(&self.registry, master) {
            if let Some(n) = self.registry.get_mut(next) {
                n.selected = true;
                info!(master = %n.address, previous = master, "master handed over");
                self.master = Some(n.address.clone());
            }
        }
        if let Some(current) = self.master.clone() {
            if elector::ensure_selected(&mut self.registry, &current) {
                info!(master = %current, "master kept selected");
            }
        }
        self.resume(was_running);
        Ok(())
    }

    /// Make the node at `index` the master by moving it to slot 0.
    pub fn reassign_master(&mut self, index: usize) -> Result<()> {
        let node = self.registry.node(index)?;
        if !node.reachable {
            return Err(ClusterError::Offline(node.address.clone()));
        }

        let was_running = self.suspend()?;
        self.registry.swap(0, index)?;
        if let Some(first) = self.registry.get_mut(0) {
            first.selected = true;
            info!(master = %first.address, "master reassigned");
            self.master = Some(first.address.clone());
        }
        self.resume(was_running);
        Ok(())
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
