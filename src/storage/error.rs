use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot {0} not found")]
    SnapshotNotFound(PathBuf),

    #[error("malformed snapshot {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),
}
