use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ClusterError, Result};
use crate::types::config::{RuntimeCommands, Settings};


/// Returns sensible defaults for all settings fields.
pub fn default_settings() -> Settings {
    Settings {
        remote_shell: "rsh".into(),
        remote_copy: "rcp".into(),
        probe_command: "ping -c 1 {host}".into(),
        remote_dir: home_dir(),
        default_hosts: (0..5).map(|i| format!("alfa0{}", i)).collect(),
        compiler: "mpicc".into(),
        compiler_flags: "-lm".into(),
        source_extension: "c".into(),
        boot_grace_ms: 5000,
        manifest_name: "lamhosts".into(),
        purge_manifest_on_halt: true,
        runtime: RuntimeCommands::default(),
    }
}

impl Default for Settings {
    fn default() -> Self {
        default_settings()
    }
}


/// Where the settings file lives when no explicit path is given.
pub fn default_path() -> PathBuf {
    if let Ok(dir) = std::env::var("LAMFRONT_CONFIG_DIR") {
        return PathBuf::from(dir).join("settings.yaml");
    }
    PathBuf::from(home_dir())
        .join(".config")
        .join("lamfront")
        .join("settings.yaml")
}


/// Load `Settings` from a YAML file. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(default_settings());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ClusterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
}


/// Save `Settings` as YAML, creating the parent directory if needed.
pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ClusterError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = serialize(settings)?;
    std::fs::write(path, content).map_err(|source| ClusterError::Io {
        path: path.to_path_buf(),
        source,
    })
}


/// Parse settings from a YAML string. Absent keys keep their defaults.
pub fn parse(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    serde_yaml::from_str(content).map_err(|e| ClusterError::Settings(e.to_string()))
}


pub fn serialize(settings: &Settings) -> Result<String> {
    serde_yaml::to_string(settings).map_err(|e| ClusterError::Settings(e.to_string()))
}


fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".into())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_five_alfa_hosts() {
        let s = default_settings();
        assert_eq!(
            s.default_hosts,
            vec!["alfa00", "alfa01", "alfa02", "alfa03", "alfa04"]
        );
        assert_eq!(s.remote_shell, "rsh");
        assert_eq!(s.boot_grace_ms, 5000);
    }

    #[test]
    fn parse_partial_keeps_defaults() {
        let yaml = "remote_shell: ssh\nboot_grace_ms: 100\nruntime:\n  run: mpirun -n\n";
        let s = parse(yaml).unwrap();
        assert_eq!(s.remote_shell, "ssh");
        assert_eq!(s.boot_grace_ms, 100);
        assert_eq!(s.runtime.run, "mpirun -n");
        assert_eq!(s.runtime.boot, "lamboot -v");
        assert_eq!(s.remote_copy, "rcp");
    }

    #[test]
    fn parse_empty_is_default() {
        assert_eq!(parse("").unwrap(), default_settings());
    }

    #[test]
    fn parse_rejects_bad_types() {
        let err = parse("boot_grace_ms: soon\n").unwrap_err();
        assert!(matches!(err, ClusterError::Settings(_)));
    }

    #[test]
    fn load_missing_file_is_default() {
        let path = std::env::temp_dir().join("lamfront-no-such-settings.yaml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(load(&path).unwrap(), default_settings());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("lamfront-settings-test");
        let path = dir.join("settings.yaml");
        let mut s = default_settings();
        s.compiler = "mpicxx".into();
        s.default_hosts = vec!["gamma".into()];
        save(&path, &s).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, s);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_path_honours_env() {
        std::env::set_var("LAMFRONT_CONFIG_DIR", "/tmp/lamfront-cfg");
        assert_eq!(
            default_path(),
            PathBuf::from("/tmp/lamfront-cfg/settings.yaml")
        );
        std::env::remove_var("LAMFRONT_CONFIG_DIR");
    }
}
