//! Job execution: the compile/distribute/run pipeline and the heuristics
//! that read remote tool output.
//!
//! Nothing here spawns processes directly. Every remote action goes through
//! the session's `RemoteExecutor`.

pub mod output;
pub mod pipeline;

pub use pipeline::{CompileMode, CompileReport, Confirm, ExecuteRequest, ExecutionReport, Job, JobStage, ProcessCount};
