//! Job pipeline: compile, distribute, execute, clean up.
//!
//! A job is one source file, compiled on the master (or on every active
//! node), copied out to the other nodes, run through the parallel launcher,
//! and then purged everywhere. The pipeline methods live on
//! `ClusterSession` because they need the registry, the master and the
//! runtime together; each one checks once on entry that a master is defined
//! and the runtime is live on it.
//!
//! Stage progression is `NoSource -> Compiled -> Distributed -> Running ->
//! Cleaned`, after which the job resets to `NoSource`. A compile failure or
//! a declined warning also resets it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::session::ClusterSession;
use crate::error::{ClusterError, Result};

use super::output::{classify, run_failed, OutputClass};


// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    NoSource,
    Compiled,
    Distributed,
    Running,
    Cleaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    /// Compile on the master only; the binary is copied out afterwards.
    SingleHost,
    /// Compile on every active node; nothing left to distribute.
    FanOut,
}

/// The current job. At most one exists per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Source base name, reused as the binary name. `None` means no job.
    pub name: Option<String>,
    pub stage: JobStage,
    pub mode: Option<CompileMode>,
}

impl Job {
    pub fn none() -> Self {
        Job::default()
    }

    pub fn reset(&mut self) {
        *self = Job::none();
    }

    /// Name of the compiled binary, if compilation got that far.
    pub fn binary(&self) -> Option<&str> {
        match self.stage {
            JobStage::Compiled | JobStage::Distributed | JobStage::Running => {
                self.name.as_deref()
            }
            JobStage::NoSource | JobStage::Cleaned => None,
        }
    }
}


// ---------------------------------------------------------------------------
// Operator decisions
// ---------------------------------------------------------------------------

/// Continue/abort decision point raised when the compiler warns.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}


// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// What the operator asked for when launching a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteRequest {
    /// Arguments passed through to the program.
    pub args: String,
    /// Process count as typed; blank or non-numeric means automatic.
    pub processes: Option<String>,
}

impl ExecuteRequest {
    pub fn new(args: &str, processes: Option<&str>) -> Self {
        ExecuteRequest {
            args: args.trim().to_string(),
            processes: processes.map(|p| p.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum ProcessCount {
    Explicit(u32),
    /// One per selected node that answered a fresh probe.
    Automatic(u32),
}

impl ProcessCount {
    pub fn value(&self) -> u32 {
        match self {
            ProcessCount::Explicit(n) | ProcessCount::Automatic(n) => *n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub job: String,
    pub mode: CompileMode,
    /// Hosts the source was compiled on, in order.
    pub hosts: Vec<String>,
    pub output: String,
    /// Warnings were reported and the operator chose to continue.
    pub warnings: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub job: String,
    pub processes: ProcessCount,
    pub output: String,
}


// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceFile {
    local: PathBuf,
    /// Base name without extension.
    name: String,
    /// File name as shipped, extension included.
    file_name: String,
}

/// Resolve operator input to a readable source file, appending the default
/// extension when none was given.
fn resolve_source(input: &str, extension: &str) -> Result<SourceFile> {
    let mut local = PathBuf::from(input.trim());
    if local.extension().is_none() {
        local.set_extension(extension);
    }
    if !local.is_file() {
        return Err(ClusterError::SourceNotFound(local));
    }
    let name = stem(&local);
    let file_name = local
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    Ok(SourceFile {
        local,
        name,
        file_name,
    })
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}


// ---------------------------------------------------------------------------
// Pipeline operations
// ---------------------------------------------------------------------------

impl ClusterSession {
    /// Master address, provided the runtime is live on it.
    fn ensure_can_enqueue(&self) -> Result<String> {
        let master = self.master.clone().ok_or(ClusterError::MasterUndefined)?;
        if !self.environment.is_active(self.executor.as_ref(), &master) {
            return Err(ClusterError::EnvironmentInactive(master));
        }
        Ok(master)
    }

    fn remote_path(&self, file: &str) -> String {
        format!("{}/{}", self.settings.remote_dir, file)
    }

    /// Compile on the master only.
    pub fn compile_job(&mut self, source: &str, confirm: &mut dyn Confirm) -> Result<CompileReport> {
        let master = self.ensure_can_enqueue()?;
        self.compile_hosts(source, CompileMode::SingleHost, vec![master], confirm)
    }

    /// Compile on every selected and reachable node.
    pub fn compile_on_all(&mut self, source: &str, confirm: &mut dyn Confirm) -> Result<CompileReport> {
        self.ensure_can_enqueue()?;
        let hosts = self.active_hosts();
        self.compile_hosts(source, CompileMode::FanOut, hosts, confirm)
    }

    /// Copy the compiled binary from the master to every other selected node.
    pub fn distribute(&mut self) -> Result<Vec<String>> {
        let master = self.ensure_can_enqueue()?;
        self.distribute_from(&master)
    }

    /// Run the compiled binary, then purge it everywhere.
    pub fn execute_job(&mut self, request: &ExecuteRequest) -> Result<ExecutionReport> {
        let master = self.ensure_can_enqueue()?;
        self.execute_on(&master, request)
    }

    /// Compile then run. Stops before running if the compile fails.
    pub fn compile_and_run(
        &mut self,
        source: &str,
        mode: CompileMode,
        request: &ExecuteRequest,
        confirm: &mut dyn Confirm,
    ) -> Result<(CompileReport, ExecutionReport)> {
        let master = self.ensure_can_enqueue()?;
        let hosts = match mode {
            CompileMode::SingleHost => vec![master.clone()],
            CompileMode::FanOut => self.active_hosts(),
        };
        let compiled = self.compile_hosts(source, mode, hosts, confirm)?;
        let executed = self.execute_on(&master, request)?;
        Ok((compiled, executed))
    }

    fn active_hosts(&self) -> Vec<String> {
        self.registry.active().map(|n| n.address.clone()).collect()
    }

    // -- Compile --

    fn compile_hosts(
        &mut self,
        source: &str,
        mode: CompileMode,
        hosts: Vec<String>,
        confirm: &mut dyn Confirm,
    ) -> Result<CompileReport> {
        let src = resolve_source(source, &self.settings.source_extension)?;
        self.job.reset();
        info!(job = %src.name, ?mode, hosts = hosts.len(), "compiling");

        let mut attempted: Vec<String> = Vec::new();
        let mut outputs: Vec<String> = Vec::new();
        let mut warned = false;
        for host in &hosts {
            attempted.push(host.clone());
            let result = self.compile_once(host, &src, confirm);
            match result {
                Ok((output, warnings)) => {
                    warned |= warnings;
                    outputs.push(match mode {
                        CompileMode::SingleHost => output,
                        CompileMode::FanOut => format!("{}:\n{}", host, output),
                    });
                }
                Err(e) => {
                    self.purge(&attempted, &src.name);
                    self.job.reset();
                    return Err(e);
                }
            }
        }

        self.job = Job {
            name: Some(src.name.clone()),
            stage: match mode {
                CompileMode::SingleHost => JobStage::Compiled,
                CompileMode::FanOut => JobStage::Distributed,
            },
            mode: Some(mode),
        };
        info!(job = %src.name, warnings = warned, "compiled");
        Ok(CompileReport {
            job: src.name,
            mode,
            hosts,
            output: outputs.join("\n"),
            warnings: warned,
        })
    }

    /// Ship and compile on one host. Returns the compiler output and whether
    /// it carried warnings the operator accepted.
    fn compile_once(
        &self,
        host: &str,
        src: &SourceFile,
        confirm: &mut dyn Confirm,
    ) -> Result<(String, bool)> {
        let remote_src = self.remote_path(&src.file_name);
        let binary = self.remote_path(&src.name);

        let copied = self.executor.copy(&src.local, host, &remote_src)?;
        if !copied.success {
            return Err(ClusterError::CopyFailed {
                host: host.to_string(),
                dst: remote_src,
                output: copied.output,
            });
        }

        let command = format!(
            "{} -o {} {} {}",
            self.settings.compiler, binary, remote_src, self.settings.compiler_flags
        );
        let out = self.executor.run(host, command.trim_end())?;
        match classify(&out.output) {
            OutputClass::Clean => Ok((out.output, false)),
            OutputClass::Errors => Err(ClusterError::CompileFailed {
                job: src.name.clone(),
                host: host.to_string(),
                output: out.output,
            }),
            OutputClass::Warnings => {
                let prompt = format!(
                    "{}\nCompilation on {} produced warnings. Continue?",
                    out.output, host
                );
                if confirm.confirm(&prompt) {
                    Ok((out.output, true))
                } else {
                    info!(job = %src.name, host, "compile declined after warnings");
                    Err(ClusterError::Declined)
                }
            }
        }
    }

    // -- Distribute --

    fn distribute_from(&mut self, master: &str) -> Result<Vec<String>> {
        let name = self.job.binary().ok_or(ClusterError::NoBinary)?.to_string();
        let binary = self.remote_path(&name);

        let targets: Vec<String> = self
            .registry
            .nodes()
            .iter()
            .filter(|n| n.selected && n.address != master)
            .map(|n| n.address.clone())
            .collect();
        for target in &targets {
            let command = format!("{} {} {}:{}", self.settings.remote_copy, binary, target, binary);
            let out = self.executor.run(master, &command)?;
            if !out.success {
                return Err(ClusterError::CopyFailed {
                    host: target.clone(),
                    dst: binary,
                    output: out.output,
                });
            }
            debug!(job = %name, target = %target, "binary copied");
        }

        self.job.stage = JobStage::Distributed;
        info!(job = %name, nodes = targets.len(), "binary distributed");
        Ok(targets)
    }

    // -- Execute --

    fn execute_on(&mut self, master: &str, request: &ExecuteRequest) -> Result<ExecutionReport> {
        let name = self.job.binary().ok_or(ClusterError::NoBinary)?.to_string();
        if self.job.mode == Some(CompileMode::SingleHost) && self.job.stage == JobStage::Compiled {
            if let Err(e) = self.distribute_from(master) {
                self.cleanup(master, &name);
                self.job.reset();
                return Err(e);
            }
        }

        let processes = self.resolve_processes(request.processes.as_deref());
        let binary = self.remote_path(&name);
        let command = format!(
            "{} {} {} {}",
            self.settings.runtime.run,
            processes.value(),
            binary,
            request.args
        );
        self.job.stage = JobStage::Running;
        info!(job = %name, processes = processes.value(), "running");
        let result = self.executor.run(master, command.trim_end());

        self.cleanup(master, &name);
        self.job.reset();

        let out = result?;
        if run_failed(&out.output, out.success) {
            return Err(ClusterError::ExecutionFailed {
                job: name,
                output: out.output,
            });
        }
        Ok(ExecutionReport {
            job: name,
            processes,
            output: out.output,
        })
    }

    /// Explicit count when numeric and positive, otherwise one process per
    /// selected node that answers a fresh probe (at least one).
    fn resolve_processes(&mut self, requested: Option<&str>) -> ProcessCount {
        if let Some(text) = requested.filter(|t| !t.is_empty()) {
            match text.parse::<u32>() {
                Ok(n) if n > 0 => return ProcessCount::Explicit(n),
                _ => warn!(requested = text, "process count not a positive number, using automatic"),
            }
        }
        let executor = self.executor.as_ref();
        let mut count = 0u32;
        for index in 0..self.registry.len() {
            let Some(node) = self.registry.get_mut(index) else {
                continue;
            };
            if !node.selected {
                continue;
            }
            node.reachable = executor.probe(&node.address);
            if node.reachable {
                count += 1;
            }
        }
        ProcessCount::Automatic(count.max(1))
    }

    fn cleanup(&mut self, master: &str, name: &str) {
        self.job.stage = JobStage::Cleaned;
        let hosts = self.active_hosts();
        self.purge(&hosts, name);
        if let Err(e) = self.executor.run(master, &self.settings.runtime.clean) {
            warn!(master, error = %e, "runtime clean failed");
        }
        info!(job = name, "job artifacts purged");
    }

    /// Remove the source, binary and crash dumps for `name` on each host.
    /// Best effort: failures are logged, never raised.
    fn purge(&self, hosts: &[String], name: &str) {
        let command = format!("rm -f {}*", self.remote_path(name));
        for host in hosts {
            if let Err(e) = self.executor.run(host, &command) {
                warn!(host = %host, error = %e, "purge failed");
            }
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::settings::default_settings;
    use crate::infrastructure::mock::MockExecutor;
    use crate::infrastructure::CommandOutput;
    use crate::types::config::Settings;

    fn settings() -> Settings {
        let mut s = default_settings();
        s.boot_grace_ms = 0;
        s.remote_dir = "/home/op".into();
        s
    }

    /// A scratch directory holding `pi.c`.
    fn source_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lamfront-pipeline-{}-{}", std::process::id(), tag));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pi.c"), "int main(void) { return 0; }\n").unwrap();
        dir
    }

    fn source(dir: &Path) -> String {
        dir.join("pi.c").to_string_lossy().into_owned()
    }

    fn booted(all: &[&str], reachable: &[&str]) -> (ClusterSession, MockExecutor) {
        let mock = MockExecutor::with_reachable(reachable);
        let hosts: Vec<String> = all.iter().map(|a| a.to_string()).collect();
        let mut s = ClusterSession::from_addresses(settings(), Box::new(mock.clone()), &hosts);
        s.boot().unwrap();
        mock.clear_calls();
        (s, mock)
    }

    fn accept() -> impl FnMut(&str) -> bool {
        |_: &str| true
    }

    fn decline() -> impl FnMut(&str) -> bool {
        |_: &str| false
    }

    // -- Guards --

    #[test]
    fn compile_requires_master() {
        let mock = MockExecutor::new();
        let mut s = ClusterSession::from_addresses(settings(), Box::new(mock), &["a".to_string()]);
        let dir = source_dir("nomaster");
        let err = s.compile_job(&source(&dir), &mut accept()).unwrap_err();
        assert!(matches!(err, ClusterError::MasterUndefined));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn compile_requires_live_runtime() {
        let mock = MockExecutor::with_reachable(&["a"]);
        let mut s = ClusterSession::from_addresses(settings(), Box::new(mock.clone()), &["a".to_string()]);
        let dir = source_dir("inactive");
        let err = s.compile_job(&source(&dir), &mut accept()).unwrap_err();
        assert!(matches!(err, ClusterError::EnvironmentInactive(ref m) if m == "a"));
        assert!(!mock.ran("mpicc"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_source_rejected() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        let err = s.compile_job("/nonexistent/lamfront/prog", &mut accept()).unwrap_err();
        match err {
            ClusterError::SourceNotFound(path) => assert_eq!(path, PathBuf::from("/nonexistent/lamfront/prog.c")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(mock.calls().iter().all(|c| !matches!(c, crate::infrastructure::mock::MockCall::Copy { .. })));
    }

    // -- Compile --

    #[test]
    fn clean_single_host_compile() {
        let (mut s, mock) = booted(&["a", "b"], &["a", "b"]);
        let dir = source_dir("clean");
        // Extension is appended when missing.
        let input = dir.join("pi").to_string_lossy().into_owned();
        let report = s.compile_job(&input, &mut decline()).unwrap();

        assert_eq!(report.job, "pi");
        assert_eq!(report.hosts, vec!["a"]);
        assert!(!report.warnings);
        assert_eq!(s.job().stage, JobStage::Compiled);
        assert_eq!(s.job().binary(), Some("pi"));
        assert!(mock.copied("a", "/home/op/pi.c").is_some());
        assert!(mock.commands_on("a").contains(&"mpicc -o /home/op/pi /home/op/pi.c -lm".to_string()));
        assert!(mock.commands_on("b").is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn compile_errors_purge_and_reset() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        mock.respond("mpicc", CommandOutput::ok("pi.c:3: warning: x\npi.c:9: Error: expected ';'"));
        let dir = source_dir("errors");
        let err = s.compile_job(&source(&dir), &mut accept()).unwrap_err();
        assert!(matches!(err, ClusterError::CompileFailed { ref host, .. } if host == "a"));
        assert!(mock.ran("rm -f /home/op/pi*"));
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn declined_warning_is_clean_abort() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        mock.respond("mpicc", CommandOutput::ok("pi.c:4: warning: unused variable 'k'"));
        let dir = source_dir("declined");
        let mut prompts = Vec::new();
        let mut answer_no = |p: &str| {
            prompts.push(p.to_string());
            false
        };
        let err = s.compile_job(&source(&dir), &mut answer_no).unwrap_err();
        assert!(matches!(err, ClusterError::Declined));
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("unused variable"));
        assert_eq!(s.job().stage, JobStage::NoSource);
        assert_eq!(s.job().name, None);
        assert!(mock.commands_on("a").contains(&"rm -f /home/op/pi*".to_string()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accepted_warning_compiles() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        mock.respond("mpicc", CommandOutput::ok("WARNING: deprecated"));
        let dir = source_dir("accepted");
        let report = s.compile_job(&source(&dir), &mut accept()).unwrap();
        assert!(report.warnings);
        assert_eq!(s.job().stage, JobStage::Compiled);
        assert!(!mock.ran("rm -f"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fan_out_compiles_on_every_active_node() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "c"]);
        let dir = source_dir("fanout");
        let report = s.compile_on_all(&source(&dir), &mut accept()).unwrap();
        assert_eq!(report.hosts, vec!["a", "c"]);
        assert_eq!(s.job().stage, JobStage::Distributed);
        assert_eq!(s.job().mode, Some(CompileMode::FanOut));
        assert!(mock.copied("c", "/home/op/pi.c").is_some());
        assert!(mock.commands_on("b").is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fan_out_failure_purges_attempted_nodes() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "b", "c"]);
        mock.respond_on("b", "mpicc", CommandOutput::ok("pi.c:1: error: no such file"));
        let dir = source_dir("fanfail");
        let err = s.compile_on_all(&source(&dir), &mut accept()).unwrap_err();
        assert!(matches!(err, ClusterError::CompileFailed { ref host, .. } if host == "b"));
        assert!(mock.commands_on("a").contains(&"rm -f /home/op/pi*".to_string()));
        assert!(mock.commands_on("b").contains(&"rm -f /home/op/pi*".to_string()));
        assert!(mock.commands_on("c").is_empty());
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    // -- Distribute --

    #[test]
    fn distribute_requires_binary() {
        let (mut s, _) = booted(&["a", "b"], &["a", "b"]);
        assert!(matches!(s.distribute(), Err(ClusterError::NoBinary)));
    }

    #[test]
    fn distribute_copies_from_master() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "b", "c"]);
        let dir = source_dir("distribute");
        s.compile_job(&source(&dir), &mut accept()).unwrap();
        let targets = s.distribute().unwrap();
        assert_eq!(targets, vec!["b", "c"]);
        assert!(mock.commands_on("a").contains(&"rcp /home/op/pi b:/home/op/pi".to_string()));
        assert!(mock.commands_on("a").contains(&"rcp /home/op/pi c:/home/op/pi".to_string()));
        assert_eq!(s.job().stage, JobStage::Distributed);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_copy_reported() {
        let (mut s, mock) = booted(&["a", "b"], &["a", "b"]);
        let dir = source_dir("copyfail");
        s.compile_job(&source(&dir), &mut accept()).unwrap();
        mock.respond("rcp", CommandOutput::failed("b: Connection refused"));
        let err = s.distribute().unwrap_err();
        assert!(matches!(err, ClusterError::CopyFailed { ref host, .. } if host == "b"));
        assert_eq!(s.job().stage, JobStage::Compiled);
        let _ = std::fs::remove_dir_all(&dir);
    }

    // -- Execute --

    #[test]
    fn execute_requires_binary() {
        let (mut s, _) = booted(&["a"], &["a"]);
        let err = s.execute_job(&ExecuteRequest::default()).unwrap_err();
        assert!(matches!(err, ClusterError::NoBinary));
    }

    #[test]
    fn execute_distributes_runs_and_cleans() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "b", "c"]);
        mock.respond("mpirun", CommandOutput::ok("pi is approximately 3.1416"));
        let dir = source_dir("execute");
        s.compile_job(&source(&dir), &mut accept()).unwrap();
        mock.clear_calls();

        let report = s.execute_job(&ExecuteRequest::new("100000", None)).unwrap();
        assert_eq!(report.processes, ProcessCount::Automatic(3));
        assert!(report.output.contains("3.1416"));

        let on_master = mock.commands_on("a");
        let copy = on_master.iter().position(|c| c.starts_with("rcp")).unwrap();
        let run = on_master.iter().position(|c| c == "mpirun -np 3 /home/op/pi 100000").unwrap();
        let clean = on_master.iter().position(|c| c == "lamclean -v").unwrap();
        assert!(copy < run && run < clean);
        for host in ["a", "b", "c"] {
            assert!(mock.commands_on(host).contains(&"rm -f /home/op/pi*".to_string()));
        }
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_and_fallback_process_counts() {
        let (mut s, mock) = booted(&["a", "b"], &["a", "b"]);
        let dir = source_dir("counts");

        s.compile_on_all(&source(&dir), &mut accept()).unwrap();
        let report = s.execute_job(&ExecuteRequest::new("", Some("8"))).unwrap();
        assert_eq!(report.processes, ProcessCount::Explicit(8));
        assert!(mock.ran("mpirun -np 8 /home/op/pi"));

        s.compile_on_all(&source(&dir), &mut accept()).unwrap();
        let report = s.execute_job(&ExecuteRequest::new("", Some("lots"))).unwrap();
        assert_eq!(report.processes, ProcessCount::Automatic(2));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn automatic_count_uses_fresh_probes() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "b", "c"]);
        let dir = source_dir("fresh");
        s.compile_on_all(&source(&dir), &mut accept()).unwrap();
        mock.set_reachable("c", false);
        let report = s.execute_job(&ExecuteRequest::default()).unwrap();
        assert_eq!(report.processes, ProcessCount::Automatic(2));
        assert!(!s.registry().nodes()[2].reachable);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_run_still_cleans_up() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        mock.respond("mpirun", CommandOutput::failed("pi: Segmentation fault"));
        let dir = source_dir("runfail");
        s.compile_job(&source(&dir), &mut accept()).unwrap();
        let err = s.execute_job(&ExecuteRequest::default()).unwrap_err();
        assert!(matches!(err, ClusterError::ExecutionFailed { ref job, .. } if job == "pi"));
        assert!(mock.ran("lamclean -v"));
        assert!(mock.ran("rm -f /home/op/pi*"));
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_copy_before_run_cleans_up() {
        let (mut s, mock) = booted(&["a", "b", "c"], &["a", "b", "c"]);
        let dir = source_dir("autocopyfail");
        s.compile_job(&source(&dir), &mut accept()).unwrap();
        mock.respond_on("a", "rcp /home/op/pi c:", CommandOutput::failed("c: Connection refused"));
        mock.clear_calls();

        let err = s.execute_job(&ExecuteRequest::default()).unwrap_err();
        assert!(matches!(err, ClusterError::CopyFailed { ref host, .. } if host == "c"));
        assert!(!mock.ran("mpirun"));
        for host in ["a", "b", "c"] {
            assert!(mock.commands_on(host).contains(&"rm -f /home/op/pi*".to_string()));
        }
        assert!(mock.commands_on("a").contains(&"lamclean -v".to_string()));
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    // -- Compile and run --

    #[test]
    fn compile_failure_stops_before_run() {
        let (mut s, mock) = booted(&["a"], &["a"]);
        mock.respond("mpicc", CommandOutput::ok("error: bad"));
        let dir = source_dir("candr-fail");
        let err = s
            .compile_and_run(&source(&dir), CompileMode::SingleHost, &ExecuteRequest::default(), &mut accept())
            .unwrap_err();
        assert!(matches!(err, ClusterError::CompileFailed { .. }));
        assert!(!mock.ran("mpirun"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn compile_and_run_fan_out() {
        let (mut s, mock) = booted(&["a", "b"], &["a", "b"]);
        let dir = source_dir("candr");
        let (compiled, executed) = s
            .compile_and_run(&source(&dir), CompileMode::FanOut, &ExecuteRequest::default(), &mut accept())
            .unwrap();
        assert_eq!(compiled.hosts, vec!["a", "b"]);
        assert_eq!(executed.processes, ProcessCount::Automatic(2));
        assert!(!mock.ran("rcp"));
        assert_eq!(*s.job(), Job::none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
