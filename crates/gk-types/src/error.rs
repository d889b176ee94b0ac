use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid revision: {0:?}")]
    InvalidRevision(String),

    #[error("unknown change status: {0:?}")]
    UnknownStatus(String),

    #[error("empty ref name")]
    EmptyRef,
}
