//! Runtime manifest: the host list pushed to the master before a boot.
//!
//! One line per distinct address, in first-occurrence order, with the number
//! of process slots that address contributes: `alfa00 slots=1`.

use serde::{Deserialize, Serialize};

use crate::types::node::Node;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub address: String,
    pub slots: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build from the selected and reachable nodes, in registry order.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut entries: Vec<ManifestEntry> = Vec::new();
        for node in nodes.iter().filter(|n| n.is_active()) {
            match entries.iter_mut().find(|e| e.address == node.address) {
                Some(entry) => entry.slots += 1,
                None => entries.push(ManifestEntry {
                    address: node.address.clone(),
                    slots: 1,
                }),
            }
        }
        Manifest { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total process slots across all hosts.
    pub fn total_slots(&self) -> u32 {
        self.entries.iter().map(|e| e.slots).sum()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} slots={}\n", e.address, e.slots))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: usize, addr: &str, selected: bool, reachable: bool) -> Node {
        Node::new(i, addr, selected, reachable)
    }

    #[test]
    fn only_active_nodes() {
        let nodes = vec![
            node(0, "a", true, true),
            node(1, "b", false, true),
            node(2, "c", true, false),
            node(3, "d", true, true),
        ];
        let m = Manifest::from_nodes(&nodes);
        assert_eq!(m.render(), "a slots=1\nd slots=1\n");
        assert_eq!(m.total_slots(), 2);
    }

    #[test]
    fn repeated_addresses_count_slots() {
        let nodes = vec![
            node(0, "big", true, true),
            node(1, "small", true, true),
            node(2, "big", true, true),
            node(3, "big", false, true),
        ];
        let m = Manifest::from_nodes(&nodes);
        assert_eq!(m.render(), "big slots=2\nsmall slots=1\n");
        assert_eq!(m.total_slots(), 3);
    }

    #[test]
    fn empty_when_nothing_active() {
        let nodes = vec![node(0, "a", false, true)];
        let m = Manifest::from_nodes(&nodes);
        assert!(m.is_empty());
        assert_eq!(m.render(), "");
    }
}
