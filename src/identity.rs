//! Downward API metadata files
//!
//! The orchestrator mounts the pod's labels and annotations as text files
//! with one `key="value"` pair per line. A missing or unreadable file is not
//! an error for the beacon: the instance simply advertises less metadata.

use crate::error::BeaconResult;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error};

/// Parsed `key=value` pairs, last occurrence wins
pub type Metadata = BTreeMap<String, String>;

/// Read a downward API file into a mapping.
///
/// Returns an empty mapping when the file does not exist or cannot be read.
/// Bytes that are not valid UTF-8 are replaced, so one bad value never hides
/// the pairs around it.
pub fn read_key_value_file(path: impl AsRef<Path>) -> Metadata {
    let path = path.as_ref();

    match read_contents(path) {
        Ok(Some(content)) => {
            let metadata = parse_key_value_lines(&content);
            debug!("Read {} entries from {}", metadata.len(), path.display());
            metadata
        }
        Ok(None) => {
            debug!("Metadata file {} not present", path.display());
            Metadata::new()
        }
        Err(e) => {
            error!("Failed to read metadata file {}: {}", path.display(), e);
            Metadata::new()
        }
    }
}

fn read_contents(path: &Path) -> BeaconResult<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse file contents that are already in memory
pub fn parse_key_value_lines(content: &str) -> Metadata {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    Some((unquote(key), unquote(value)))
}

/// Trim whitespace, then drop at most one leading and one trailing `"`
fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    trimmed.strip_suffix('"').unwrap_or(trimmed).to_string()
}
