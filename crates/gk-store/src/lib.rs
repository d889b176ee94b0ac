//! Read-only revision store access for the gatekeeper.
//!
//! The gatekeeper never writes to the repository it guards. Everything it
//! needs from history goes through the [`RevisionStore`] trait: the changeset
//! between two revisions, the bytes of one path at one revision, the files
//! directly under a directory, and commit signature verification.
//!
//! # Storage Backends
//!
//! - [`GitCliStore`] -- shells out to the `git` binary (hook deployments)
//! - [`InMemoryRepository`] -- snapshot map for tests and embedding
//!
//! # Design Rules
//!
//! 1. A missing path is `Ok(None)`, never an error.
//! 2. A revision the store cannot resolve is an error; there are no partial
//!    changesets.
//! 3. A failed signature check is `Ok(false)`; only the inability to run the
//!    check at all is an error.

pub mod diff;
pub mod error;
pub mod git;
pub mod memory;
pub mod reader;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use diff::{diff_snapshots, Snapshot};
pub use error::{StoreError, StoreResult};
pub use git::GitCliStore;
pub use memory::{InMemoryRepository, SignatureRecord};
pub use reader::TreeReader;
pub use traits::RevisionStore;
