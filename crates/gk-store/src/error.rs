use std::path::PathBuf;

use gk_types::TypeError;

/// Errors from revision store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The revision does not exist or cannot be resolved.
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    /// The given location is not a git repository.
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// A git subcommand exited unsuccessfully.
    ///
    /// `status` is `-1` when the process was killed by a signal.
    #[error("`{command}` failed with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Store output could not be interpreted.
    #[error("malformed store output: {0}")]
    Malformed(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value read from the store failed to parse.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
