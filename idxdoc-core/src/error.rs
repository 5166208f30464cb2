use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdxError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("modlist line {line}: {reason}")]
    LedgerParse { line: usize, reason: String },

    /// The game process holds the file; close the game and retry.
    #[error("{path:?} is in use by another process")]
    RepairBlocked { path: PathBuf },

    /// The write went through but the read-back disagrees.
    #[error("repair of {path:?} did not stick: expected {expected}, read back {found}")]
    RepairFailed { path: PathBuf, expected: u16, found: u16 },

    #[error("config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl IdxError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IdxError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, IdxError>;
