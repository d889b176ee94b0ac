//! Metadata index for the gatekeeper.
//!
//! Keeps a queryable projection of the metadata documents found in the
//! repository, one entry per `(branch, directory)`. The projection is updated
//! incrementally from each accepted changeset and persisted as a single JSON
//! document that is rewritten whole.
//!
//! # Key Types
//!
//! - [`IndexKey`] -- `(branch, meta_dir)` composite key
//! - [`IndexEntry`] -- a document plus its system fields
//! - [`MetadataIndex`] -- the ordered in-memory collection
//! - [`IndexStore`] -- persistence seam, with [`JsonIndexFile`] and
//!   [`InMemoryIndexStore`] backends
//! - [`IndexProjector`] -- applies a changeset to an index

pub mod entry;
pub mod error;
pub mod index;
pub mod projector;
pub mod store;

pub use entry::{IndexEntry, IndexKey, SYSTEM_FIELDS};
pub use error::{IndexError, IndexResult};
pub use index::MetadataIndex;
pub use projector::{IndexProjector, ProjectionSummary};
pub use store::{InMemoryIndexStore, IndexStore, JsonIndexFile};
