//! Host-list file: one hostname or IP per line, `#` comments, blank lines
//! ignored. Order is significant and becomes the initial slot numbering.

use std::path::Path;

use crate::error::{ClusterError, Result};


/// Extract host identifiers from host-list text, in file order.
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}


/// Read a host-list file. Both failure modes are fatal.
pub fn load(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(ClusterError::HostListMissing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ClusterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let hosts = parse(&content);
    if hosts.is_empty() {
        return Err(ClusterError::HostListEmpty(path.to_path_buf()));
    }
    Ok(hosts)
}
