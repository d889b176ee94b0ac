use std::path::Path;

use gk_types::{ChangeEntry, Revision};

use crate::error::StoreResult;

/// Read-only view of a repository's history.
///
/// All implementations must satisfy these invariants:
/// - `diff` reports deletions as [`gk_types::ChangeStatus::Deleted`], never
///   folded into modifications.
/// - An old revision equal to the null sentinel diffs against the empty tree.
/// - `read_blob` returns `Ok(None)` for a path that is absent (or is a
///   directory) at the revision.
/// - Nothing here mutates the repository.
pub trait RevisionStore: Send + Sync {
    /// Changed paths between `old` and `new`, in store order.
    fn diff(&self, old: &Revision, new: &Revision) -> StoreResult<Vec<ChangeEntry>>;

    /// Exact bytes stored at `path` in `revision`.
    fn read_blob(&self, revision: &Revision, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Full paths of the files directly inside `dir` at `revision`.
    ///
    /// A missing directory yields an empty list.
    fn list_tree(&self, revision: &Revision, dir: &str) -> StoreResult<Vec<String>>;

    /// Verify the signature on the commit at `revision`.
    ///
    /// With `allowed_signers = None` the store's native mechanism decides;
    /// otherwise verification is done explicitly against that allowed-signers
    /// file. Returns `Ok(false)` for unsigned or badly signed commits.
    fn verify_signature(
        &self,
        revision: &Revision,
        allowed_signers: Option<&Path>,
    ) -> StoreResult<bool>;
}
