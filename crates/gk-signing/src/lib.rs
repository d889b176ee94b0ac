//! Commit signature verification for the gatekeeper.
//!
//! Verification first asks the revision store to check the commit natively.
//! When that fails, the public keys committed under the repository's signer
//! directories are gathered into a temporary allowed-signers file and the
//! check is repeated against it. The temporary file lives exactly as long as
//! the [`AllowedSigners`] value that owns it.
//!
//! No verification error escapes as an error: anything that goes wrong is
//! reported as [`SignatureStatus::Unverified`].

pub mod allowed;
pub mod error;
pub mod gate;

pub use allowed::{allowed_signers_line, AllowedSigners};
pub use error::{SigningError, SigningResult};
pub use gate::{SignatureGate, SignatureStatus};
