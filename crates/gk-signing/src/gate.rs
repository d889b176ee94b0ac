use std::fmt;

use gk_store::RevisionStore;
use gk_types::Revision;

use crate::allowed::AllowedSigners;
use crate::error::SigningResult;

/// How (or whether) a commit signature was verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The store's native verification accepted the signature.
    Native,
    /// Verified against keys committed under `directory`.
    AllowedSigners { directory: String, entries: usize },
    /// Native verification failed and no signer directory held any key.
    NoKeys,
    /// Verification was attempted and failed.
    Unverified { reason: String },
}

impl SignatureStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Native | Self::AllowedSigners { .. })
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "verified natively"),
            Self::AllowedSigners { directory, entries } => {
                write!(f, "verified against {entries} key(s) from {directory}")
            }
            Self::NoKeys => write!(f, "not verified: no signer keys found"),
            Self::Unverified { reason } => write!(f, "not verified: {reason}"),
        }
    }
}

/// Verifies commit signatures, natively first and then against committed keys.
#[derive(Clone, Debug)]
pub struct SignatureGate {
    /// Signer key directories, most preferred first.
    directories: Vec<String>,
}

impl SignatureGate {
    pub fn new<I, S>(directories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    /// `<control>/.ssh` preferred, then `.ssh` at the repository root.
    pub fn for_control_dir(control_dir: &str) -> Self {
        let control = control_dir.trim_end_matches('/');
        Self::new([format!("{control}/.ssh"), ".ssh".to_string()])
    }

    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    /// Verify the signature on `revision`. Never fails; problems are
    /// reported as [`SignatureStatus::Unverified`].
    pub fn verify(&self, store: &dyn RevisionStore, revision: &Revision) -> SignatureStatus {
        let status = match self.try_verify(store, revision) {
            Ok(status) => status,
            Err(e) => SignatureStatus::Unverified {
                reason: e.to_string(),
            },
        };
        tracing::info!(revision = %revision.short(), %status, "signature check");
        status
    }

    fn try_verify(
        &self,
        store: &dyn RevisionStore,
        revision: &Revision,
    ) -> SigningResult<SignatureStatus> {
        match store.verify_signature(revision, None) {
            Ok(true) => return Ok(SignatureStatus::Native),
            Ok(false) => tracing::debug!("native verification failed; trying committed keys"),
            Err(e) => tracing::debug!(error = %e, "native verification errored; trying committed keys"),
        }

        let Some((directory, signers)) = self.collect(store, revision)? else {
            return Ok(SignatureStatus::NoKeys);
        };
        tracing::debug!(
            directory = %directory,
            entries = signers.len(),
            path = %signers.path().display(),
            "verifying against temporary allowed-signers file"
        );

        // `signers` is dropped (and the file removed) on every path out of here.
        let verified = store.verify_signature(revision, Some(signers.path()))?;
        Ok(if verified {
            SignatureStatus::AllowedSigners {
                directory,
                entries: signers.len(),
            }
        } else {
            SignatureStatus::Unverified {
                reason: format!("no key under {directory} matches the signature"),
            }
        })
    }

    /// The first directory, in preference order, that yields any entry.
    fn collect(
        &self,
        store: &dyn RevisionStore,
        revision: &Revision,
    ) -> SigningResult<Option<(String, AllowedSigners)>> {
        for directory in &self.directories {
            let mut files = Vec::new();
            for path in store.list_tree(revision, directory)? {
                if let Some(bytes) = store.read_blob(revision, &path)? {
                    files.push(bytes);
                }
            }
            if let Some(signers) = AllowedSigners::from_key_files(files)? {
                return Ok(Some((directory.clone(), signers)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_store::InMemoryRepository;

    fn rev(name: &str) -> Revision {
        Revision::parse(name).unwrap()
    }

    fn repo(files: &[(&str, &str)]) -> (InMemoryRepository, Revision) {
        let repo = InMemoryRepository::new();
        let r = rev("tip");
        repo.insert_revision(&r, files.iter().map(|(p, c)| (p.to_string(), c.to_string())));
        (repo, r)
    }

    fn gate() -> SignatureGate {
        SignatureGate::for_control_dir(".gatekeeper")
    }

    // -----------------------------------------------------------------------
    // Native path
    // -----------------------------------------------------------------------

    #[test]
    fn native_verification_short_circuits() {
        let (repo, r) = repo(&[]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", true);
        assert_eq!(gate().verify(&repo, &r), SignatureStatus::Native);
        assert!(repo.signer_files_seen().is_empty());
    }

    // -----------------------------------------------------------------------
    // Allowed-signers fallback
    // -----------------------------------------------------------------------

    #[test]
    fn control_directory_keys_verify() {
        let (repo, r) = repo(&[(".gatekeeper/.ssh/alice.pub", "ssh-ed25519 AAAAalice alice@laptop")]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", false);

        let status = gate().verify(&repo, &r);
        assert_eq!(
            status,
            SignatureStatus::AllowedSigners {
                directory: ".gatekeeper/.ssh".into(),
                entries: 1
            }
        );
        assert!(status.is_verified());
    }

    #[test]
    fn control_directory_preferred_over_root() {
        let (repo, r) = repo(&[
            (".gatekeeper/.ssh/team.pub", "ssh-ed25519 AAAAteam"),
            (".ssh/alice.pub", "ssh-ed25519 AAAAalice"),
        ]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", false);

        let status = gate().verify(&repo, &r);
        assert!(matches!(status, SignatureStatus::Unverified { .. }));
    }

    #[test]
    fn root_directory_used_when_control_has_none() {
        let (repo, r) = repo(&[(".ssh/alice.pub", "ssh-ed25519 AAAAalice")]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", false);
        assert!(matches!(
            gate().verify(&repo, &r),
            SignatureStatus::AllowedSigners { ref directory, .. } if directory == ".ssh"
        ));
    }

    #[test]
    fn no_keys_fails_outright() {
        let (repo, r) = repo(&[("data/a/meta.yaml", "title: A")]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", false);
        let status = gate().verify(&repo, &r);
        assert_eq!(status, SignatureStatus::NoKeys);
        assert!(!status.is_verified());
        assert!(repo.signer_files_seen().is_empty());
    }

    #[test]
    fn unsigned_commit_is_unverified() {
        let (repo, r) = repo(&[(".gatekeeper/.ssh/alice.pub", "ssh-ed25519 AAAAalice")]);
        assert!(!gate().verify(&repo, &r).is_verified());
    }

    #[test]
    fn temporary_file_removed_after_success_and_failure() {
        let (repo, r) = repo(&[(".gatekeeper/.ssh/alice.pub", "ssh-ed25519 AAAAalice")]);
        repo.sign(&r, "ssh-ed25519 AAAAalice", false);
        assert!(gate().verify(&repo, &r).is_verified());

        let other = rev("other");
        repo.derive_revision(&r, &other, Vec::<(String, String)>::new(), &[])
            .unwrap();
        repo.sign(&other, "ssh-ed25519 AAAAmallory", false);
        assert!(!gate().verify(&repo, &other).is_verified());

        let seen = repo.signer_files_seen();
        assert_eq!(seen.len(), 2);
        for (path, existed) in seen {
            assert!(existed, "file must exist while verifying");
            assert!(!path.exists(), "file must be removed afterwards");
        }
    }

    #[test]
    fn store_errors_become_unverified() {
        let (repo, _) = repo(&[]);
        let status = gate().verify(&repo, &rev("missing"));
        assert!(matches!(status, SignatureStatus::Unverified { .. }));
    }
}
