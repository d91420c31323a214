//! Interactive menus.
//!
//! Every action runs to completion and reports its outcome; a non-fatal
//! error prints and returns to the menu it came from.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use lamfront_core::cluster::{BootOutcome, ClusterSession, EnvStatus, HaltOutcome};
use lamfront_core::error::ClusterError;
use lamfront_core::execution::{CompileMode, CompileReport, ExecuteRequest, ExecutionReport};
use lamfront_core::{parse_slot, SelectionTarget};

use crate::console::{is_yes, Console};


// ---------------------------------------------------------------------------
// Choices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainChoice {
    Cluster,
    Boot,
    Halt,
    Status,
    Jobs,
    Editor,
    Quit,
}

impl MainChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MainChoice::Cluster),
            "2" => Some(MainChoice::Boot),
            "3" => Some(MainChoice::Halt),
            "4" => Some(MainChoice::Status),
            "5" => Some(MainChoice::Jobs),
            "6" => Some(MainChoice::Editor),
            "0" | "q" | "Q" => Some(MainChoice::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterChoice {
    Swap,
    Add,
    Remove,
    Toggle,
    Reassign,
    Back,
}

impl ClusterChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(ClusterChoice::Swap),
            "2" => Some(ClusterChoice::Add),
            "3" => Some(ClusterChoice::Remove),
            "4" => Some(ClusterChoice::Toggle),
            "5" => Some(ClusterChoice::Reassign),
            "0" => Some(ClusterChoice::Back),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobChoice {
    Compile,
    CompileAll,
    Distribute,
    Execute,
    CompileAndRun,
    Back,
}

impl JobChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(JobChoice::Compile),
            "2" => Some(JobChoice::CompileAll),
            "3" => Some(JobChoice::Distribute),
            "4" => Some(JobChoice::Execute),
            "5" => Some(JobChoice::CompileAndRun),
            "0" => Some(JobChoice::Back),
            _ => None,
        }
    }
}

const MAIN_MENU: &[&str] = &[
    "1) Cluster configuration",
    "2) Boot runtime",
    "3) Halt runtime",
    "4) Runtime status",
    "5) Jobs",
    "6) Edit a source file",
    "0) Quit",
];

const CLUSTER_MENU: &[&str] = &[
    "1) Swap two nodes",
    "2) Add a node",
    "3) Remove a node",
    "4) Toggle selection (* for all)",
    "5) Reassign master",
    "0) Back",
];

const JOB_MENU: &[&str] = &[
    "1) Compile on master",
    "2) Compile on all selected nodes",
    "3) Distribute binary",
    "4) Execute",
    "5) Compile and run",
    "0) Back",
];


// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Run the main menu until the operator quits or input ends. Quitting halts
/// the runtime first.
pub fn run<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    loop {
        console.title("LAM/MPI cluster front end");
        for item in MAIN_MENU {
            console.line(item);
        }
        let Some(input) = console.prompt("> ") else {
            break;
        };
        match MainChoice::parse(&input) {
            Some(MainChoice::Cluster) => cluster_menu(session, console),
            Some(MainChoice::Boot) => boot(session, console),
            Some(MainChoice::Halt) => halt(session, console),
            Some(MainChoice::Status) => status(session, console),
            Some(MainChoice::Jobs) => job_menu(session, console),
            Some(MainChoice::Editor) => editor(console),
            Some(MainChoice::Quit) => break,
            None => console.warn(&format!("unknown option '{}'", input)),
        }
    }
    shutdown(session, console);
}

fn shutdown<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    match session.halt() {
        Ok(HaltOutcome::Halted) => console.note("Runtime halted"),
        Ok(HaltOutcome::NotRunning) => {}
        Err(e) => debug!(error = %e, "no halt on exit"),
    }
}

fn show_error<R: BufRead, W: Write>(console: &mut Console<R, W>, err: &ClusterError) {
    warn!(error = %err, "operation aborted");
    console.fail(&err.to_string());
    if let ClusterError::CompileFailed { output, .. }
    | ClusterError::VerificationFailed { output, .. }
    | ClusterError::ExecutionFailed { output, .. } = err
    {
        if !output.is_empty() {
            console.line(output);
        }
    }
}


// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

fn boot<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    match session.boot() {
        Ok(BootOutcome::AlreadyActive) => console.warn("Runtime already active"),
        Ok(BootOutcome::Booted(booted)) => {
            console.title("Manifest");
            console.line(&booted.manifest);
            console.title("Connectivity");
            console.line(&booted.connectivity);
            console.title("Members");
            console.line(&booted.members);
            console.note("Runtime booted");
        }
        Err(e) => show_error(console, &e),
    }
}

fn halt<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    match session.halt() {
        Ok(HaltOutcome::Halted) => console.note("Runtime halted"),
        Ok(HaltOutcome::NotRunning) => console.warn("Runtime not running"),
        Err(e) => show_error(console, &e),
    }
}

fn status<R: BufRead, W: Write>(session: &ClusterSession, console: &mut Console<R, W>) {
    match session.status() {
        EnvStatus::MasterUndefined => console.warn("Master undefined"),
        EnvStatus::Inactive => console.warn("Runtime inactive"),
        EnvStatus::ActiveOnHost(host) => {
            console.note(&format!("Runtime active on {}", host));
            if let Ok(members) = session.members() {
                console.line(&members);
            }
        }
    }
}


// ---------------------------------------------------------------------------
// Cluster configuration
// ---------------------------------------------------------------------------

fn cluster_menu<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    loop {
        console.nodes(session.registry(), session.master());
        for item in CLUSTER_MENU {
            console.line(item);
        }
        let Some(input) = console.prompt("cluster> ") else {
            return;
        };
        let result = match ClusterChoice::parse(&input) {
            Some(ClusterChoice::Back) => return,
            Some(ClusterChoice::Swap) => swap(session, console),
            Some(ClusterChoice::Add) => add(session, console),
            Some(ClusterChoice::Remove) => remove(session, console),
            Some(ClusterChoice::Toggle) => toggle(session, console),
            Some(ClusterChoice::Reassign) => reassign(session, console),
            None => {
                console.warn(&format!("unknown option '{}'", input));
                Ok(())
            }
        };
        if let Err(e) = result {
            show_error(console, &e);
        }
    }
}

/// Prompt for a slot; `None` when the operator enters nothing.
fn ask_slot<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    label: &str,
) -> Option<Result<usize, ClusterError>> {
    let input = console.prompt(label)?;
    if input.is_empty() {
        return None;
    }
    Some(parse_slot(&input))
}

fn swap<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let Some(a) = ask_slot(console, "First node (nX): ") else {
        return Ok(());
    };
    let Some(b) = ask_slot(console, "Second node (nX): ") else {
        return Ok(());
    };
    session.swap_nodes(a?, b?)?;
    console.note("Nodes swapped");
    Ok(())
}

fn add<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let address = console.prompt("Address: ").unwrap_or_default();
    if address.is_empty() {
        return Ok(());
    }
    let index = session.add_node(&address)?;
    console.note(&format!("{} added as n{}", address, index));
    Ok(())
}

fn remove<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let Some(index) = ask_slot(console, "Node to remove (nX): ") else {
        return Ok(());
    };
    let removed = session.remove_node(index?)?;
    console.note(&format!("{} removed", removed.address));
    Ok(())
}

fn toggle<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let input = console.prompt("Node to toggle (nX or *): ").unwrap_or_default();
    if input.is_empty() {
        return Ok(());
    }
    session.toggle_selection(SelectionTarget::parse(&input)?)
}

fn reassign<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let Some(index) = ask_slot(console, "New master (nX): ") else {
        return Ok(());
    };
    session.reassign_master(index?)?;
    if let Some(master) = session.master() {
        let text = format!("{} is now master", master);
        console.note(&text);
    }
    Ok(())
}


// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

fn job_menu<R: BufRead, W: Write>(session: &mut ClusterSession, console: &mut Console<R, W>) {
    loop {
        match session.job().name.as_deref() {
            Some(name) => console.title(&format!("Jobs (current: {})", name)),
            None => console.title("Jobs (current: none)"),
        }
        for item in JOB_MENU {
            console.line(item);
        }
        let Some(input) = console.prompt("jobs> ") else {
            return;
        };
        let result = match JobChoice::parse(&input) {
            Some(JobChoice::Back) => return,
            Some(JobChoice::Compile) => compile(session, console, CompileMode::SingleHost),
            Some(JobChoice::CompileAll) => compile(session, console, CompileMode::FanOut),
            Some(JobChoice::Distribute) => distribute(session, console),
            Some(JobChoice::Execute) => execute(session, console),
            Some(JobChoice::CompileAndRun) => compile_and_run(session, console),
            None => {
                console.warn(&format!("unknown option '{}'", input));
                Ok(())
            }
        };
        if let Err(e) = result {
            show_error(console, &e);
        }
    }
}

fn show_compile<R: BufRead, W: Write>(console: &mut Console<R, W>, report: &CompileReport) {
    if !report.output.is_empty() {
        console.line(&report.output);
    }
    console.note(&format!("{} compiled on {}", report.job, report.hosts.join(", ")));
}

fn show_execution<R: BufRead, W: Write>(console: &mut Console<R, W>, report: &ExecutionReport) {
    console.line(&report.output);
    console.note(&format!(
        "{} finished with {} processes",
        report.job,
        report.processes.value()
    ));
    console.bell();
}

fn compile<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
    mode: CompileMode,
) -> Result<(), ClusterError> {
    let source = console.prompt("Source file: ").unwrap_or_default();
    if source.is_empty() {
        return Ok(());
    }
    let report = match mode {
        CompileMode::SingleHost => session.compile_job(&source, console)?,
        CompileMode::FanOut => session.compile_on_all(&source, console)?,
    };
    show_compile(console, &report);
    Ok(())
}

fn distribute<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let targets = session.distribute()?;
    console.note(&format!("Binary copied to {} node(s)", targets.len()));
    Ok(())
}

fn ask_request<R: BufRead, W: Write>(console: &mut Console<R, W>) -> ExecuteRequest {
    let processes = console.prompt("Processes (blank for automatic): ").unwrap_or_default();
    let args = console.prompt("Arguments: ").unwrap_or_default();
    let processes = (!processes.is_empty()).then_some(processes);
    ExecuteRequest::new(&args, processes.as_deref())
}

fn execute<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let request = ask_request(console);
    let result = session.execute_job(&request);
    ring_on_failure(console, &result);
    show_execution(console, &result?);
    Ok(())
}

fn compile_and_run<R: BufRead, W: Write>(
    session: &mut ClusterSession,
    console: &mut Console<R, W>,
) -> Result<(), ClusterError> {
    let source = console.prompt("Source file: ").unwrap_or_default();
    if source.is_empty() {
        return Ok(());
    }
    let all = console.prompt("Compile on all nodes? (S/N) ").unwrap_or_default();
    let mode = if is_yes(&all) {
        CompileMode::FanOut
    } else {
        CompileMode::SingleHost
    };
    let request = ask_request(console);
    let result = session.compile_and_run(&source, mode, &request, console);
    ring_on_failure(console, &result);
    let (compiled, executed) = result?;
    show_compile(console, &compiled);
    show_execution(console, &executed);
    Ok(())
}

/// A failed run finished too; the operator still gets the bell.
fn ring_on_failure<R: BufRead, W: Write, T>(
    console: &mut Console<R, W>,
    result: &Result<T, ClusterError>,
) {
    if let Err(ClusterError::ExecutionFailed { .. }) = result {
        console.bell();
    }
}


// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

pub const DEFAULT_EDITOR: &str = "mcedit";

pub fn editor_program() -> String {
    std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}

fn editor<R: BufRead, W: Write>(console: &mut Console<R, W>) {
    let file = console.prompt("File to edit: ").unwrap_or_default();
    if file.is_empty() {
        return;
    }
    let program = editor_program();
    match std::process::Command::new(&program).arg(&file).status() {
        Ok(status) if status.success() => {}
        Ok(status) => console.warn(&format!("{} exited with {}", program, status)),
        Err(e) => console.fail(&format!("cannot start {}: {}", program, e)),
    }
}
