use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while creating or writing a session directory.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create session directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize session payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid session file name '{0}'")]
    InvalidName(String),
}
