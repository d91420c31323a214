//! Error type shared by every cluster operation.
//!
//! Two failures are fatal (the host list cannot be used at all); everything
//! else aborts only the operation that raised it and leaves the session as
//! it was before the operation began.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// The host-list file named on the command line does not exist.
    #[error("host list {} does not exist", .0.display())]
    HostListMissing(PathBuf),

    /// The host-list file exists but holds no usable entries.
    #[error("host list {} has no usable entries", .0.display())]
    HostListEmpty(PathBuf),

    #[error("master node undefined")]
    MasterUndefined,

    #[error("runtime inactive on {0}")]
    EnvironmentInactive(String),

    /// A fresh probe found the node down.
    #[error("node {0} is offline")]
    Offline(String),

    #[error("invalid node '{0}'")]
    InvalidSlot(String),

    #[error("{0} is already part of the cluster")]
    DuplicateAddress(String),

    #[error("address {0} is not reachable")]
    Unreachable(String),

    #[error("cannot remove the only node of the cluster")]
    LastNode,

    #[error("no selected and reachable nodes to boot")]
    EmptyManifest,

    /// Growing or shrinking the live runtime was refused on the master.
    #[error("runtime update on {host} failed: {output}")]
    RuntimeUpdateFailed { host: String, output: String },

    /// A file could not be shipped to a host.
    #[error("copy to {host}:{dst} failed: {output}")]
    CopyFailed {
        host: String,
        dst: String,
        output: String,
    },

    /// The pre-boot check of the manifest did not report success.
    #[error("runtime verification failed on {host}")]
    VerificationFailed { host: String, output: String },

    #[error("source file {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("compilation of {job} failed on {host}")]
    CompileFailed {
        job: String,
        host: String,
        output: String,
    },

    #[error("cancelled by the operator")]
    Declined,

    #[error("no compiled binary, compile first")]
    NoBinary,

    #[error("execution of {job} failed")]
    ExecutionFailed { job: String, output: String },

    /// A local helper process could not be started at all.
    #[error("failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ClusterError {
    /// Whether the process must terminate instead of returning to the menu.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClusterError::HostListMissing(_) | ClusterError::HostListEmpty(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
