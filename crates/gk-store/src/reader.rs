use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use gk_types::Revision;

use crate::error::StoreResult;
use crate::traits::RevisionStore;

/// Reads file contents at one fixed revision.
///
/// An optional map of pre-resolved contents takes precedence over the store,
/// for callers that already hold the changed files and cannot (or should not)
/// hit the object store again. Cloning is cheap; the sandbox holds its own
/// clone for the lifetime of a policy run.
#[derive(Clone)]
pub struct TreeReader {
    store: Arc<dyn RevisionStore>,
    revision: Revision,
    overrides: Arc<BTreeMap<String, Vec<u8>>>,
}

impl TreeReader {
    /// Reader over `revision` with no overrides.
    pub fn new(store: Arc<dyn RevisionStore>, revision: Revision) -> Self {
        Self {
            store,
            revision,
            overrides: Arc::new(BTreeMap::new()),
        }
    }

    /// Replace the pre-resolved content map.
    pub fn with_overrides(mut self, overrides: BTreeMap<String, Vec<u8>>) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    /// The revision this reader is pinned to.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn RevisionStore> {
        &self.store
    }

    /// Bytes at `path`, or `None` if absent.
    pub fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(bytes) = self.overrides.get(path) {
            tracing::trace!(path, "read served from pre-resolved contents");
            return Ok(Some(bytes.clone()));
        }
        self.store.read_blob(&self.revision, path)
    }

    /// Files directly under `dir` (store only; overrides describe changed
    /// files, not directory listings).
    pub fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        self.store.list_tree(&self.revision, dir)
    }
}

impl fmt::Debug for TreeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeReader")
            .field("revision", &self.revision)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;

    fn reader() -> TreeReader {
        let repo = InMemoryRepository::new();
        let rev = Revision::parse("r1").unwrap();
        repo.insert_revision(&rev, [("a.txt", "from store"), ("b.txt", "only in store")]);
        TreeReader::new(Arc::new(repo), rev)
    }

    #[test]
    fn reads_from_store() {
        let reader = reader();
        assert_eq!(reader.read("a.txt").unwrap().as_deref(), Some(&b"from store"[..]));
        assert!(reader.read("missing").unwrap().is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut overrides = BTreeMap::new();
        overrides.insert("a.txt".to_string(), b"pre-resolved".to_vec());
        overrides.insert("new.txt".to_string(), b"not in store".to_vec());
        let reader = reader().with_overrides(overrides);

        assert_eq!(reader.read("a.txt").unwrap().as_deref(), Some(&b"pre-resolved"[..]));
        assert_eq!(reader.read("new.txt").unwrap().as_deref(), Some(&b"not in store"[..]));
        assert_eq!(reader.read("b.txt").unwrap().as_deref(), Some(&b"only in store"[..]));
    }

    #[test]
    fn debug_hides_contents() {
        let debug = format!("{:?}", reader());
        assert!(debug.contains("TreeReader"));
        assert!(!debug.contains("from store"));
    }
}
