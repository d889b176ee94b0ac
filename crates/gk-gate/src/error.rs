use gk_index::IndexError;
use gk_store::StoreError;

/// Errors that stop the pipeline before a decision is reached.
///
/// Policy violations are never errors; they end up in a rejected
/// [`Decision`](crate::Decision).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Invocation context or configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The changeset between the two revisions could not be computed.
    #[error("could not extract changes: {0}")]
    Extraction(#[source] StoreError),

    /// A store read needed by a stage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The index could not be loaded or written.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

impl GateError {
    /// Whether this error means the pipeline is misconfigured, as opposed to
    /// a failure talking to the repository.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
