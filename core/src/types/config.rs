use serde::{Deserialize, Serialize};

/// Command vocabulary of the distributed runtime, run on the master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeCommands {
    /// Lists live members; output starting with `-` means inactive.
    pub status: String,
    /// Pre-boot check run against the manifest.
    pub verify: String,
    /// Case-insensitive marker that `verify` prints on success.
    pub verify_marker: String,
    pub boot: String,
    pub halt: String,
    /// Removes runtime state left behind for a manifest.
    pub wipe: String,
    /// Connectivity check across all booted members.
    pub ping: String,
    /// Adds one host to a live runtime: `<grow> <index> <address>`.
    pub grow: String,
    /// Removes one member from a live runtime: `<shrink> <slot_id>`.
    pub shrink: String,
    /// Parallel launcher: `<run> <count> <binary> <args>`.
    pub run: String,
    pub clean: String,
}

impl Default for RuntimeCommands {
    fn default() -> Self {
        RuntimeCommands {
            status: "lamnodes".into(),
            verify: "recon -v".into(),
            verify_marker: "WOO HOO!".into(),
            boot: "lamboot -v".into(),
            halt: "lamhalt -v".into(),
            wipe: "wipe -v".into(),
            ping: "tping -c1 N".into(),
            grow: "lamgrow -n".into(),
            shrink: "lamshrink".into(),
            run: "mpirun -np".into(),
            clean: "lamclean -v".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Program used to run a command on a host: `<remote_shell> <host> <cmd>`.
    pub remote_shell: String,
    /// Program used to copy a local file: `<remote_copy> <src> <host>:<dst>`.
    pub remote_copy: String,
    /// Reachability probe; `{host}` is substituted, exit status decides.
    pub probe_command: String,
    /// Working directory for sources, binaries and the manifest on every node.
    pub remote_dir: String,
    /// Hosts used when no host-list file is given.
    pub default_hosts: Vec<String>,
    pub compiler: String,
    pub compiler_flags: String,
    pub source_extension: String,
    /// Wait between firing the boot and checking convergence.
    pub boot_grace_ms: u64,
    pub manifest_name: String,
    /// Wipe the manifest from the master on an operator-requested halt.
    pub purge_manifest_on_halt: bool,
    pub runtime: RuntimeCommands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_json_round_trip() {
        let settings = Settings {
            remote_shell: "ssh".into(),
            remote_copy: "scp".into(),
            probe_command: "ping -c 1 -W 1 {host}".into(),
            remote_dir: "/home/mpi".into(),
            default_hosts: vec!["beta0".into(), "beta1".into()],
            compiler: "mpicc".into(),
            compiler_flags: "-O2 -lm".into(),
            source_extension: "c".into(),
            boot_grace_ms: 2000,
            manifest_name: "hostfile".into(),
            purge_manifest_on_halt: false,
            runtime: RuntimeCommands::default(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn runtime_defaults_are_lam() {
        let rt = RuntimeCommands::default();
        assert_eq!(rt.status, "lamnodes");
        assert_eq!(rt.boot, "lamboot -v");
        assert_eq!(rt.verify_marker, "WOO HOO!");
    }
}
