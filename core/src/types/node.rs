//! Cluster node record and slot identifiers.
//!
//! A `Node` is one machine in the registry. Its slot id mirrors its position
//! in the registry and is rewritten by the registry whenever nodes move.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};


// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// `"n<index>"`, rewritten by the registry whenever positions change.
    pub slot_id: String,
    /// Hostname or IP address.
    pub address: String,
    /// Whether the node takes part in the next runtime boot.
    pub selected: bool,
    /// Cached result of the last reachability probe.
    pub reachable: bool,
}

impl Node {
    pub fn new(index: usize, address: &str, selected: bool, reachable: bool) -> Self {
        Node {
            slot_id: slot_id(index),
            address: address.to_string(),
            selected,
            reachable,
        }
    }

    /// Selected and last seen reachable: the nodes a runtime boot uses.
    pub fn is_active(&self) -> bool {
        self.selected && self.reachable
    }
}


// ---------------------------------------------------------------------------
// Slot ids
// ---------------------------------------------------------------------------

/// Format a registry index as a slot id.
pub fn slot_id(index: usize) -> String {
    format!("n{}", index)
}

/// Parse operator input naming a slot. Accepts `n3`, `N3` and `3`.
pub fn parse_slot(input: &str) -> Result<usize> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix('n')
        .or_else(|| trimmed.strip_prefix('N'))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ClusterError::InvalidSlot(input.to_string()));
    }
    digits
        .parse::<usize>()
        .map_err(|_| ClusterError::InvalidSlot(input.to_string()))
}


// ---------------------------------------------------------------------------
// SelectionTarget
// ---------------------------------------------------------------------------

/// What a selection toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    /// `*`: every node, one at a time.
    All,
    One(usize),
}

impl SelectionTarget {
    pub fn parse(input: &str) -> Result<SelectionTarget> {
        if input.trim() == "*" {
            return Ok(SelectionTarget::All);
        }
        parse_slot(input).map(SelectionTarget::One)
    }
}
