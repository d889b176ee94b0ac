use gk_store::StoreError;

/// Errors raised while assembling an allowed-signers file.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("allowed-signers file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for signing operations.
pub type SigningResult<T> = Result<T, SigningError>;
