use gk_store::StoreError;

/// Errors from policy construction and document parsing.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A whitelist pattern could not be compiled.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Document bytes are not valid UTF-8.
    #[error("document is not valid UTF-8")]
    NotUtf8,

    /// The document parsed but is not a key/value mapping.
    #[error("document is not a mapping")]
    NotAMapping,

    /// The line-oriented fallback parser rejected a line.
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// The document holds no keys at all.
    #[error("document is empty")]
    EmptyDocument,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
