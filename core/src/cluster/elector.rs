//! Master election.
//!
//! Election is deterministic and order-dependent: the first reachable node in
//! registry order wins. Whatever node ends up master is forced selected, so
//! the coordinator is never left outside its own runtime.

use tracing::info;

use super::registry::NodeRegistry;


/// Pick the first reachable node as master and select it.
pub fn elect(registry: &mut NodeRegistry) -> Option<String> {
    let index = registry.nodes().iter().position(|n| n.reachable)?;
    let node = registry.get_mut(index)?;
    node.selected = true;
    info!(master = %node.address, slot = %node.slot_id, "master elected");
    Some(node.address.clone())
}


/// First node other than `master` that is reachable and still selected.
pub fn successor(registry: &NodeRegistry, master: &str) -> Option<usize> {
    registry
        .nodes()
        .iter()
        .position(|n| n.address != master && n.reachable && n.selected)
}


/// Force the master's node selected. Returns whether anything changed.
pub fn ensure_selected(registry: &mut NodeRegistry, master: &str) -> bool {
    match registry.position(master).and_then(|i| registry.get_mut(i)) {
        Some(node) if !node.selected => {
            node.selected = true;
            true
        }
        _ => false,
    }
}
