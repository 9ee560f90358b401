use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Current schema version for `events.jsonl` lines.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// One line of the append-only session log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Schema version for forwards compatibility.
    pub schema_version: u32,
    /// Position of the event within the session, starting at 1.
    pub seq: u64,
    /// RFC 3339 timestamp of when the event was written.
    pub ts: String,
    /// Event discriminator, e.g. `render` or `evaluation`.
    pub kind: String,
    /// Event body as written by the caller.
    pub payload: Value,
}

/// Read every complete event from a session log.
///
/// A trailing line that does not parse (a write interrupted by a crash) is
/// skipped with a warning instead of failing the whole read.
pub fn read_events(path: &Path) -> Result<Vec<EventRecord>, SessionError> {
    let content = fs::read_to_string(path).map_err(|source| SessionError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut events = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str::<EventRecord>(line) {
            Ok(event) => events.push(event),
            Err(err) if index + 1 == lines.len() => {
                warn!(path = %path.display(), %err, "Skipping truncated trailing event");
            }
            Err(err) => return Err(SessionError::Serialize(err)),
        }
    }
    Ok(events)
}
