//! Cluster membership and runtime lifecycle.
//!
//! `registry` keeps the ordered node list, `elector` picks the master,
//! `manifest` renders the host list the runtime boots from and
//! `environment` drives boot and halt on the master. `session` ties them
//! together behind the operator-facing operations.

pub mod elector;
pub mod environment;
pub mod manifest;
pub mod registry;
pub mod session;

pub use environment::{BootOutcome, BootReport, EnvState, EnvStatus, EnvironmentController, HaltOutcome};
pub use manifest::{Manifest, ManifestEntry};
pub use registry::NodeRegistry;
pub use session::{ClusterSession, ClusterSnapshot};
