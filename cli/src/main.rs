//! lamfront: interactive front end for a LAM/MPI cluster.
//!
//! # Usage
//!
//! ```text
//! lamfront                    # default host set alfa00..alfa04
//! lamfront nodes.txt          # hosts from a file, one per line
//! lamfront --status-json      # print the cluster snapshot and exit
//! lamfront --write-config     # write the effective settings file
//! ```

mod console;
mod menu;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lamfront_core::data::settings;
use lamfront_core::{ClusterSession, RshExecutor, Settings, ShellRunner};

use crate::console::Console;


#[derive(Parser, Debug)]
#[command(name = "lamfront")]
#[command(version)]
#[command(about = "Cluster membership and job front end for LAM/MPI")]
struct Args {
    /// Host-list file, one hostname or address per line
    hosts: Option<PathBuf>,

    /// Settings file (default: $LAMFRONT_CONFIG_DIR/settings.yaml or ~/.config/lamfront/settings.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print a JSON snapshot of nodes, master and runtime status, then exit
    #[arg(long)]
    status_json: bool,

    /// Write the effective settings to the settings file, then exit
    #[arg(long)]
    write_config: bool,
}


fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings_path = resolve_settings_path(args.config.as_deref());
    let settings = load_settings(&settings_path);

    if args.write_config {
        if let Err(e) = settings::save(&settings_path, &settings) {
            eprintln!("lamfront: {}", e);
            process::exit(1);
        }
        println!("{}", settings_path.display());
        return;
    }

    let mut session = match open_session(settings, args.hosts.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot load cluster");
            eprintln!("lamfront: {}", e);
            process::exit(1);
        }
    };

    if args.status_json {
        match session.snapshot_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("lamfront: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match session.reset_stale_environment() {
        Ok(true) => info!("stale runtime halted"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "could not reset stale runtime"),
    }

    let mut console = Console::stdio();
    menu::run(&mut session, &mut console);
}


fn init_logging(verbose: bool) {
    let default = if verbose {
        "lamfront=debug,lamfront_core=debug"
    } else {
        "lamfront=info,lamfront_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


fn resolve_settings_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => settings::default_path(),
    }
}


/// A broken settings file is reported and replaced by the defaults.
fn load_settings(path: &Path) -> Settings {
    match settings::load(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings ignored, using defaults");
            settings::default_settings()
        }
    }
}


fn open_session(settings: Settings, hosts: Option<&Path>) -> lamfront_core::Result<ClusterSession> {
    let executor = Box::new(RshExecutor::new(&settings, Box::new(ShellRunner)));
    match hosts {
        Some(path) => ClusterSession::load_from_file(settings, executor, path),
        None => Ok(ClusterSession::load_default(settings, executor)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_accept_host_file_and_flags() {
        let args = Args::parse_from(["lamfront", "-v", "--config", "/tmp/s.yaml", "nodes.txt"]);
        assert_eq!(args.hosts, Some(PathBuf::from("nodes.txt")));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/s.yaml")));
        assert!(args.verbose);
        assert!(!args.status_json);
    }

    #[test]
    fn args_default_to_no_host_file() {
        let args = Args::parse_from(["lamfront", "--status-json"]);
        assert_eq!(args.hosts, None);
        assert!(args.status_json);
    }

    #[test]
    fn explicit_settings_path_wins() {
        let path = resolve_settings_path(Some(Path::new("/etc/lamfront.yaml")));
        assert_eq!(path, PathBuf::from("/etc/lamfront.yaml"));
    }

    #[test]
    fn broken_settings_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join("lamfront-cli-bad-settings");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.yaml");
        std::fs::write(&path, "boot_grace_ms: [1, 2]\n").unwrap();
        assert_eq!(load_settings(&path), settings::default_settings());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_host_file_is_fatal() {
        let path = std::env::temp_dir().join("lamfront-cli-no-hosts");
        let _ = std::fs::remove_file(&path);
        let err = open_session(settings::default_settings(), Some(&path)).unwrap_err();
        assert!(err.is_fatal());
    }
}
