//! Infrastructure seam between the cluster engine and the outside world.
//!
//! `RemoteExecutor` is everything the engine needs from the network: run a
//! command on a host, fire one without waiting, probe reachability and copy
//! a local file over. `RshExecutor` implements it with the classic remote
//! shell tools; `MockExecutor` simulates a cluster for tests.

pub mod mock;
pub mod rsh;
pub mod runner;

use std::path::Path;

use crate::error::Result;

pub use runner::CommandOutput;

/// Blocking access to the cluster hosts. Every call returns only when the
/// underlying command has finished, except `run_detached`.
pub trait RemoteExecutor {
    /// Run `command` on `host` and capture its output.
    fn run(&self, host: &str, command: &str) -> Result<CommandOutput>;

    /// Start `command` on `host` and return immediately.
    fn run_detached(&self, host: &str, command: &str) -> Result<()>;

    /// Whether `host` currently answers on the network.
    fn probe(&self, host: &str) -> bool;

    /// Copy a local file to `dst` on `host`.
    fn copy(&self, src: &Path, host: &str, dst: &str) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockExecutor;

    #[test]
    fn mock_implements_remote_executor() {
        let mock = MockExecutor::new();
        let _: &dyn RemoteExecutor = &mock;
    }
}
