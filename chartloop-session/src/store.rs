use crate::error::SessionError;
use crate::event::{EVENT_SCHEMA_VERSION, EventRecord};
use chrono::{Local, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Append-only event log inside a session directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Manifest snapshot inside a session directory.
pub const MANIFEST_FILE: &str = "session.json";

/// Build a session id from the local time plus a short random suffix.
///
/// The timestamp keeps directories sortable; the suffix keeps two sessions
/// started within the same second apart.
pub fn new_session_id() -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}", &suffix[..8])
}

/// Storage handle for one session directory.
pub struct SessionStore {
    id: String,
    dir: PathBuf,
    events: File,
    seq: u64,
}

impl SessionStore {
    /// Create a fresh session directory under `root`.
    pub fn create(root: &Path) -> Result<Self, SessionError> {
        Self::create_with_id(root, new_session_id())
    }

    /// Create (or reopen) the session directory `root/<id>`.
    pub fn create_with_id(root: &Path, id: impl Into<String>) -> Result<Self, SessionError> {
        let id = id.into();
        validate_name(&id)?;
        let dir = root.join(&id);
        fs::create_dir_all(&dir).map_err(|source| SessionError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let events_path = dir.join(EVENTS_FILE);
        let events = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .map_err(|source| SessionError::Write {
                path: events_path.clone(),
                source,
            })?;

        debug!(session = id.as_str(), dir = %dir.display(), "Opened session store");
        Ok(Self {
            id,
            dir,
            events,
            seq: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of a file inside the session directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Number of events written so far.
    pub fn event_count(&self) -> u64 {
        self.seq
    }

    /// Append one event line.
    ///
    /// The line goes out in a single write, so a reader never sees half an
    /// event except after a crash mid-write, which `read_events` tolerates.
    pub fn append_event<T: Serialize>(&mut self, kind: &str, payload: &T) -> Result<u64, SessionError> {
        let record = EventRecord {
            schema_version: EVENT_SCHEMA_VERSION,
            seq: self.seq + 1,
            ts: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.events_path();
        let write_err = |source| SessionError::Write {
            path: path.clone(),
            source,
        };
        self.events.write_all(line.as_bytes()).map_err(write_err)?;
        self.events.flush().map_err(write_err)?;

        self.seq = record.seq;
        Ok(record.seq)
    }

    /// Write a text file into the session directory, replacing it atomically.
    pub fn write_text(&self, name: &str, content: &str) -> Result<PathBuf, SessionError> {
        validate_name(name)?;
        let dest = self.dir.join(name);
        write_atomic(&dest, content.as_bytes())?;
        Ok(dest)
    }

    /// Replace `session.json` with a pretty-printed snapshot.
    pub fn write_manifest<T: Serialize>(&self, manifest: &T) -> Result<PathBuf, SessionError> {
        let body = serde_json::to_string_pretty(manifest)?;
        let dest = self.manifest_path();
        write_atomic(&dest, body.as_bytes())?;
        Ok(dest)
    }

    /// Copy an existing file into the session directory under `name`.
    pub fn copy_into(&self, source: &Path, name: &str) -> Result<PathBuf, SessionError> {
        validate_name(name)?;
        let dest = self.dir.join(name);
        publish_file(source, &dest)?;
        Ok(dest)
    }
}

/// Copy `source` to `dest` through a temporary sibling and a rename, so
/// readers never observe a half-written destination.
pub fn publish_file(source: &Path, dest: &Path) -> Result<(), SessionError> {
    let bytes = fs::read(source).map_err(|err| SessionError::Read {
        path: source.to_path_buf(),
        source: err,
    })?;
    write_atomic(dest, &bytes)
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| SessionError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;

    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));
    let write_err = |source| SessionError::Write {
        path: dest.to_path_buf(),
        source,
    };

    {
        let mut tmp = File::create(&tmp_path).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.sync_data().map_err(write_err)?;
    }
    fs::rename(&tmp_path, dest).map_err(write_err)?;
    Ok(())
}

fn validate_name(name: &str) -> Result<(), SessionError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(SessionError::InvalidName(name.to_string()));
    }
    Ok(())
}
