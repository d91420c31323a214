//! Ordered node registry.
//!
//! Order is significant: it defines slot numbering, master election order and
//! manifest line order. Every mutation that moves nodes renumbers them so the
//! node at position `i` always carries slot id `n<i>`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterError, Result};
use crate::infrastructure::RemoteExecutor;
use crate::types::node::{slot_id, Node};


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry { nodes: Vec::new() }
    }

    /// Probe every address and build the registry in the given order. A node
    /// starts selected exactly when it answered the probe. Repeated addresses
    /// are kept: each occurrence is one more process slot on that host.
    pub fn probe_all(executor: &dyn RemoteExecutor, addresses: &[String]) -> Self {
        let nodes = addresses
            .iter()
            .enumerate()
            .map(|(i, address)| {
                let reachable = executor.probe(address);
                debug!(slot = i, address = %address, reachable, "probed node");
                Node::new(i, address, reachable, reachable)
            })
            .collect();
        NodeRegistry { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Look up a slot, failing with `InvalidSlot` when out of range.
    pub fn node(&self, index: usize) -> Result<&Node> {
        self.nodes
            .get(index)
            .ok_or_else(|| ClusterError::InvalidSlot(slot_id(index)))
    }

    /// Position of the first node with this address.
    pub fn position(&self, address: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.address == address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.position(address).is_some()
    }

    /// Selected and reachable nodes, in registry order.
    pub fn active(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_active())
    }

    pub fn selected_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.selected).count()
    }

    /// Append a new selected, reachable node. Returns its index.
    pub fn add(&mut self, address: &str) -> Result<usize> {
        if self.contains(address) {
            return Err(ClusterError::DuplicateAddress(address.to_string()));
        }
        let index = self.nodes.len();
        self.nodes.push(Node::new(index, address, true, true));
        Ok(index)
    }

    /// Remove a node and renumber the ones after it.
    pub fn remove(&mut self, index: usize) -> Result<Node> {
        if index >= self.nodes.len() {
            return Err(ClusterError::InvalidSlot(slot_id(index)));
        }
        if self.nodes.len() == 1 {
            return Err(ClusterError::LastNode);
        }
        let removed = self.nodes.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Exchange two positions. Slot ids stay with the positions.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        for index in [a, b] {
            if index >= self.nodes.len() {
                return Err(ClusterError::InvalidSlot(slot_id(index)));
            }
        }
        self.nodes.swap(a, b);
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.slot_id = slot_id(i);
        }
    }
}
