//! Classification of captured remote output.
//!
//! Remote tools report trouble in their text, not reliably in exit codes, so
//! the engine decides success by scanning output for markers. All of that
//! heuristic lives here; callers only see the classified result.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OutputClass
// ---------------------------------------------------------------------------

/// Verdict on a compiler (or other tool) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputClass {
    Clean,
    /// Mentions warnings but no errors; the operator decides.
    Warnings,
    Errors,
}

/// Classify output case-insensitively. "error" anywhere wins over "warning".
pub fn classify(output: &str) -> OutputClass {
    let upper = output.to_uppercase();
    if upper.contains("ERROR") {
        OutputClass::Errors
    } else if upper.contains("WARNING") {
        OutputClass::Warnings
    } else {
        OutputClass::Clean
    }
}

// ---------------------------------------------------------------------------
// Runtime markers
// ---------------------------------------------------------------------------

/// Whether a runtime status listing reports a live runtime. An inactive
/// runtime answers with a banner that starts with `-`.
pub fn runtime_is_active(status_output: &str, success: bool) -> bool {
    let trimmed = status_output.trim_start();
    success && !trimmed.starts_with('-')
}

/// Whether pre-boot verification output carries the success marker.
pub fn verification_passed(output: &str, marker: &str) -> bool {
    output.to_uppercase().contains(&marker.to_uppercase())
}

/// One node of a live runtime as listed by its status command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMember {
    /// Runtime node number, the `3` of `n3`.
    pub id: u32,
    pub address: String,
}

/// Parse a member listing such as `n0\talfa00:1:origin,this_node`. Lines
/// that do not start with a node id are skipped.
pub fn parse_members(listing: &str) -> Vec<RuntimeMember> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?.strip_prefix('n')?.parse::<u32>().ok()?;
            let host = fields.next()?.split(':').next()?;
            if host.is_empty() {
                return None;
            }
            Some(RuntimeMember {
                id,
                address: host.to_string(),
            })
        })
        .collect()
}

/// Banner the parallel launcher prints when a rank dies before finishing.
const RUN_ABORT_MARKER: &str = "one of the processes that was started with mpirun";

/// Whether a parallel job run failed. Program output is free text and may
/// mention "error" on its own, so only the exit status and the launcher's
/// abort banner count.
pub fn run_failed(output: &str, success: bool) -> bool {
    !success || output.contains(RUN_ABORT_MARKER)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
