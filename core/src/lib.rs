//! Lamfront core: cluster membership, master election, distributed-runtime
//! lifecycle and the job pipeline for a small LAM/MPI cluster.
//!
//! The engine never talks to the network itself. All remote work goes
//! through [`RemoteExecutor`]; the binary plugs in [`RshExecutor`], tests use
//! [`infrastructure::mock::MockExecutor`].

pub mod cluster;
pub mod data;
pub mod error;
pub mod execution;
pub mod infrastructure;
pub mod types;

pub use cluster::{ClusterSession, EnvStatus};
pub use error::{ClusterError, Result};
pub use infrastructure::rsh::RshExecutor;
pub use infrastructure::runner::{CommandRunner, ShellRunner};
pub use infrastructure::RemoteExecutor;
pub use types::config::Settings;
pub use types::node::{parse_slot, Node, SelectionTarget};
