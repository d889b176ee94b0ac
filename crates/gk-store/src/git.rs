//! Revision store backed by the `git` command-line tool.
//!
//! Only plumbing commands are used (`diff-tree`, `ls-tree`, `cat-file`,
//! `mktree`, `verify-commit`) so user configuration such as colors, external
//! diff drivers or pagers cannot change the output format.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use gk_types::{ChangeEntry, ChangeStatus, Revision};

use crate::error::{StoreError, StoreResult};
use crate::traits::RevisionStore;

/// A `git` binary driven against one repository (bare or not).
#[derive(Clone, Debug)]
pub struct GitCliStore {
    repo: PathBuf,
    git_dir: PathBuf,
    git_binary: PathBuf,
}

/// One line of `git ls-tree` output.
#[derive(Debug, PartialEq, Eq)]
struct TreeLine {
    kind: String,
    object: String,
    path: String,
}

impl GitCliStore {
    /// Open the repository at `repo` using `git` from `PATH`.
    pub fn open(repo: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_binary(repo, "git")
    }

    /// Open the repository at `repo` with an explicit git binary.
    pub fn open_with_binary(repo: impl AsRef<Path>, git_binary: impl Into<PathBuf>) -> StoreResult<Self> {
        let repo = repo.as_ref().to_path_buf();
        let git_binary = git_binary.into();
        let output = Command::new(&git_binary)
            .arg("-C")
            .arg(&repo)
            .args(["rev-parse", "--git-dir"])
            .stdin(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(StoreError::NotARepository(repo));
        }
        let reported = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let git_dir = if reported.is_absolute() {
            reported
        } else {
            repo.join(reported)
        };
        tracing::debug!(repo = %repo.display(), git_dir = %git_dir.display(), "opened git repository");
        Ok(Self {
            repo,
            git_dir,
            git_binary,
        })
    }

    /// Location the store was opened at.
    pub fn repo_path(&self) -> &Path {
        &self.repo
    }

    /// The repository's internal storage directory (`.git` or the bare repo).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Resolve a revision expression (e.g. `HEAD`) to a full object id.
    ///
    /// Returns `Ok(None)` if the expression does not resolve, which is the
    /// normal state of `HEAD` before the first commit.
    pub fn resolve(&self, expression: &str) -> StoreResult<Option<Revision>> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", expression])?;
        if !output.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(Some(Revision::parse(&text)?))
    }

    /// Short name of the checked-out branch, or `None` on a detached HEAD.
    pub fn current_branch(&self) -> StoreResult<Option<String>> {
        let output = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    /// Write the current staging area as a tree and return its id.
    ///
    /// Pre-commit hooks use this as the "new" revision: the staged state has
    /// no commit yet but is addressable as a tree.
    pub fn write_index_tree(&self) -> StoreResult<Revision> {
        let stdout = self.run_ok(&["write-tree"])?;
        Ok(Revision::parse(&String::from_utf8_lossy(&stdout))?)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.arg("-C").arg(&self.repo).stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> StoreResult<Output> {
        tracing::trace!(?args, "running git");
        Ok(self.command().args(args).output()?)
    }

    fn run_ok(&self, args: &[&str]) -> StoreResult<Vec<u8>> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(StoreError::Command {
                command: format!("git {}", args.join(" ")),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Id of the empty tree in this repository's hash algorithm.
    fn empty_tree(&self) -> StoreResult<String> {
        let stdout = self.run_ok(&["mktree"])?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    fn ls_tree(&self, revision: &Revision, pathspec: &str) -> StoreResult<Vec<TreeLine>> {
        let stdout = self.run_ok(&["ls-tree", "-z", revision.as_str(), "--", pathspec])?;
        parse_ls_tree(&stdout)
    }
}

impl RevisionStore for GitCliStore {
    fn diff(&self, old: &Revision, new: &Revision) -> StoreResult<Vec<ChangeEntry>> {
        if new.is_null() {
            return Err(StoreError::UnknownRevision(new.to_string()));
        }
        let old_spec = if old.is_null() {
            self.empty_tree()?
        } else {
            old.as_str().to_string()
        };
        let stdout = self.run_ok(&[
            "diff-tree",
            "-r",
            "--no-renames",
            "--name-status",
            "-z",
            old_spec.as_str(),
            new.as_str(),
        ])
        .map_err(|err| match err {
            StoreError::Command { stderr, .. } => {
                StoreError::UnknownRevision(format!("{old_spec}..{new}: {stderr}"))
            }
            other => other,
        })?;
        parse_name_status(&stdout)
    }

    fn read_blob(&self, revision: &Revision, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let lines = self.ls_tree(revision, path)?;
        let Some(line) = lines.into_iter().find(|l| l.path == path) else {
            return Ok(None);
        };
        if line.kind != "blob" {
            return Ok(None);
        }
        Ok(Some(self.run_ok(&["cat-file", "blob", line.object.as_str()])?))
    }

    fn list_tree(&self, revision: &Revision, dir: &str) -> StoreResult<Vec<String>> {
        let pathspec = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .ls_tree(revision, &pathspec)?
            .into_iter()
            .filter(|l| l.kind == "blob")
            .map(|l| l.path)
            .collect())
    }

    fn verify_signature(
        &self,
        revision: &Revision,
        allowed_signers: Option<&Path>,
    ) -> StoreResult<bool> {
        let mut cmd = self.command();
        if let Some(file) = allowed_signers {
            cmd.arg("-c")
                .arg(format!("gpg.ssh.allowedSignersFile={}", file.display()));
        }
        let output = cmd.args(["verify-commit", revision.as_str()]).output()?;
        if !output.status.success() {
            tracing::debug!(
                revision = %revision.short(),
                explicit_signers = allowed_signers.is_some(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "signature verification failed"
            );
        }
        Ok(output.status.success())
    }
}

/// Parse `git diff-tree --name-status -z` output (`S\0path\0` pairs).
fn parse_name_status(stdout: &[u8]) -> StoreResult<Vec<ChangeEntry>> {
    let text = String::from_utf8_lossy(stdout);
    let mut fields = text.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();
    while let Some(status) = fields.next() {
        let path = fields
            .next()
            .ok_or_else(|| StoreError::Malformed(format!("status {status:?} without a path")))?;
        changes.push(ChangeEntry::new(ChangeStatus::from_git_letter(status)?, path));
    }
    Ok(changes)
}

/// Parse `git ls-tree -z` output (`mode kind object\tpath\0`).
fn parse_ls_tree(stdout: &[u8]) -> StoreResult<Vec<TreeLine>> {
    let text = String::from_utf8_lossy(stdout);
    text.split('\0')
        .filter(|record| !record.is_empty())
        .map(|record| {
            let (meta, path) = record
                .split_once('\t')
                .ok_or_else(|| StoreError::Malformed(format!("ls-tree record {record:?}")))?;
            let mut parts = meta.split_whitespace();
            let (_mode, kind, object) = match (parts.next(), parts.next(), parts.next()) {
                (Some(m), Some(k), Some(o)) => (m, k, o),
                _ => return Err(StoreError::Malformed(format!("ls-tree record {record:?}"))),
            };
            Ok(TreeLine {
                kind: kind.to_string(),
                object: object.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}
