use std::path::PathBuf;

use gk_store::StoreError;

/// Errors that can occur while maintaining the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Reading a changed file from the revision store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The index document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The index file could not be read or written.
    #[error("index file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
