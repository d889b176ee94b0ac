use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use gk_types::{ChangeEntry, Revision};

use crate::diff::{diff_snapshots, Snapshot};
use crate::error::{StoreError, StoreResult};
use crate::traits::RevisionStore;

/// Signature attached to a revision in an [`InMemoryRepository`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Public key line the commit was signed with (e.g. `ssh-ed25519 AAAA...`).
    pub public_key: String,
    /// Whether the store's native verification already trusts this key.
    pub natively_trusted: bool,
}

/// In-memory, snapshot-based revision store.
///
/// Intended for tests and embedding. Each revision maps to a flattened
/// [`Snapshot`]. Signatures are simulated: native verification succeeds for
/// natively trusted keys, and allowed-signers verification succeeds when the
/// supplied file contains the signing key.
pub struct InMemoryRepository {
    revisions: RwLock<HashMap<Revision, Snapshot>>,
    signatures: RwLock<HashMap<Revision, SignatureRecord>>,
    /// Every allowed-signers path handed to `verify_signature`, with whether
    /// the file existed at that moment.
    signer_files: RwLock<Vec<(PathBuf, bool)>>,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            revisions: RwLock::new(HashMap::new()),
            signatures: RwLock::new(HashMap::new()),
            signer_files: RwLock::new(Vec::new()),
        }
    }

    /// Record a revision with the given files, replacing any previous one.
    pub fn insert_revision<I, P, C>(&self, revision: &Revision, files: I)
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: AsRef<[u8]>,
    {
        let snapshot: Snapshot = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.as_ref().to_vec()))
            .collect();
        self.revisions
            .write()
            .expect("lock poisoned")
            .insert(revision.clone(), snapshot);
    }

    /// Record `revision` as a copy of `base` with `writes` applied and
    /// `removals` deleted.
    pub fn derive_revision<I, P, C>(
        &self,
        base: &Revision,
        revision: &Revision,
        writes: I,
        removals: &[&str],
    ) -> StoreResult<()>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: AsRef<[u8]>,
    {
        let mut snapshot = self.snapshot(base)?;
        for (p, c) in writes {
            snapshot.insert(p.into(), c.as_ref().to_vec());
        }
        for path in removals {
            snapshot.remove(*path);
        }
        self.insert_revision(revision, snapshot);
        Ok(())
    }

    /// Attach a signature to a revision.
    pub fn sign(&self, revision: &Revision, public_key: impl Into<String>, natively_trusted: bool) {
        self.signatures.write().expect("lock poisoned").insert(
            revision.clone(),
            SignatureRecord {
                public_key: public_key.into(),
                natively_trusted,
            },
        );
    }

    /// Allowed-signers files seen by `verify_signature`, in call order.
    pub fn signer_files_seen(&self) -> Vec<(PathBuf, bool)> {
        self.signer_files.read().expect("lock poisoned").clone()
    }

    /// Number of recorded revisions.
    pub fn len(&self) -> usize {
        self.revisions.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no revision has been recorded.
    pub fn is_empty(&self) -> bool {
        self.revisions.read().expect("lock poisoned").is_empty()
    }

    fn snapshot(&self, revision: &Revision) -> StoreResult<Snapshot> {
        if revision.is_null() {
            return Ok(Snapshot::new());
        }
        self.revisions
            .read()
            .expect("lock poisoned")
            .get(revision)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRevision(revision.to_string()))
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionStore for InMemoryRepository {
    fn diff(&self, old: &Revision, new: &Revision) -> StoreResult<Vec<ChangeEntry>> {
        if new.is_null() {
            return Err(StoreError::UnknownRevision(new.to_string()));
        }
        let old_snapshot = self.snapshot(old)?;
        let new_snapshot = self.snapshot(new)?;
        Ok(diff_snapshots(&old_snapshot, &new_snapshot))
    }

    fn read_blob(&self, revision: &Revision, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.revisions.read().expect("lock poisoned");
        let snapshot = map
            .get(revision)
            .ok_or_else(|| StoreError::UnknownRevision(revision.to_string()))?;
        Ok(snapshot.get(path).cloned())
    }

    fn list_tree(&self, revision: &Revision, dir: &str) -> StoreResult<Vec<String>> {
        let map = self.revisions.read().expect("lock poisoned");
        let snapshot = map
            .get(revision)
            .ok_or_else(|| StoreError::UnknownRevision(revision.to_string()))?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(snapshot
            .keys()
            .filter(|path| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }

    fn verify_signature(
        &self,
        revision: &Revision,
        allowed_signers: Option<&Path>,
    ) -> StoreResult<bool> {
        let record = self
            .signatures
            .read()
            .expect("lock poisoned")
            .get(revision)
            .cloned();

        match allowed_signers {
            None => Ok(record.is_some_and(|r| r.natively_trusted)),
            Some(path) => {
                self.signer_files
                    .write()
                    .expect("lock poisoned")
                    .push((path.to_path_buf(), path.exists()));
                let Some(record) = record else {
                    return Ok(false);
                };
                let contents = std::fs::read_to_string(path)?;
                Ok(contents
                    .lines()
                    .any(|line| line.contains(record.public_key.trim())))
            }
        }
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("revision_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rev(name: &str) -> Revision {
        Revision::parse(name).unwrap()
    }

    fn repo_with_base() -> (InMemoryRepository, Revision) {
        let repo = InMemoryRepository::new();
        let base = rev("base");
        repo.insert_revision(
            &base,
            [
                ("data/a/meta.yaml", "title: A"),
                (".gatekeeper/.ssh/alice.pub", "ssh-ed25519 AAAAalice"),
                (".gatekeeper/.ssh/nested/bob.pub", "ssh-ed25519 AAAAbob"),
            ],
        );
        (repo, base)
    }

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    #[test]
    fn diff_between_revisions() {
        let (repo, base) = repo_with_base();
        let next = rev("next");
        repo.derive_revision(&base, &next, [("data/b/meta.yaml", "title: B")], &["data/a/meta.yaml"])
            .unwrap();
        let changes = repo.diff(&base, &next).unwrap();
        assert_eq!(
            changes,
            vec![
                ChangeEntry::deleted("data/a/meta.yaml"),
                ChangeEntry::added("data/b/meta.yaml"),
            ]
        );
    }

    #[test]
    fn diff_from_null_lists_every_file() {
        let (repo, base) = repo_with_base();
        let changes = repo.diff(&Revision::null(), &base).unwrap();
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn diff_with_unknown_revision_fails() {
        let (repo, base) = repo_with_base();
        let missing = rev("missing");
        assert!(matches!(
            repo.diff(&base, &missing),
            Err(StoreError::UnknownRevision(_))
        ));
        assert!(repo.diff(&base, &Revision::null()).is_err());
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[test]
    fn read_blob_present_and_absent() {
        let (repo, base) = repo_with_base();
        assert_eq!(
            repo.read_blob(&base, "data/a/meta.yaml").unwrap().as_deref(),
            Some(&b"title: A"[..])
        );
        assert!(repo.read_blob(&base, "nope").unwrap().is_none());
    }

    #[test]
    fn list_tree_is_not_recursive() {
        let (repo, base) = repo_with_base();
        let listed = repo.list_tree(&base, ".gatekeeper/.ssh").unwrap();
        assert_eq!(listed, vec![".gatekeeper/.ssh/alice.pub".to_string()]);
        assert!(repo.list_tree(&base, ".ssh").unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Signatures
    // -----------------------------------------------------------------------

    #[test]
    fn native_verification_requires_trusted_signature() {
        let (repo, base) = repo_with_base();
        assert!(!repo.verify_signature(&base, None).unwrap());
        repo.sign(&base, "ssh-ed25519 AAAAalice", false);
        assert!(!repo.verify_signature(&base, None).unwrap());
        repo.sign(&base, "ssh-ed25519 AAAAalice", true);
        assert!(repo.verify_signature(&base, None).unwrap());
    }

    #[test]
    fn allowed_signers_verification_matches_key() {
        let (repo, base) = repo_with_base();
        repo.sign(&base, "ssh-ed25519 AAAAalice", false);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "* ssh-ed25519 AAAAalice").unwrap();
        assert!(repo.verify_signature(&base, Some(file.path())).unwrap());

        let mut other = tempfile::NamedTempFile::new().unwrap();
        writeln!(other, "* ssh-ed25519 AAAAmallory").unwrap();
        assert!(!repo.verify_signature(&base, Some(other.path())).unwrap());

        let seen = repo.signer_files_seen();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, existed)| *existed));
    }
}
