use std::collections::BTreeMap;
use std::fmt;

use gk_types::Revision;

/// Which hook the pipeline is running for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationKind {
    /// Local commit. A failed verdict is final.
    Commit,
    /// Push / receive. A valid signature can rescue a failed verdict.
    Receive,
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("pre-commit"),
            Self::Receive => f.write_str("pre-receive"),
        }
    }
}

/// Everything the caller supplies for one pipeline run.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub kind: InvocationKind,
    /// Previous state, or the all-zero revision when there is none.
    pub old: Revision,
    pub new: Revision,
    /// Branch name, without `refs/heads/`.
    pub branch: String,
    /// Pre-resolved file contents; these win over store reads.
    pub contents: BTreeMap<String, Vec<u8>>,
}

impl Invocation {
    pub fn new(kind: InvocationKind, old: Revision, new: Revision, branch: impl Into<String>) -> Self {
        Self {
            kind,
            old,
            new,
            branch: branch.into(),
            contents: BTreeMap::new(),
        }
    }

    pub fn commit(old: Revision, new: Revision, branch: impl Into<String>) -> Self {
        Self::new(InvocationKind::Commit, old, new, branch)
    }

    pub fn receive(old: Revision, new: Revision, branch: impl Into<String>) -> Self {
        Self::new(InvocationKind::Receive, old, new, branch)
    }

    pub fn with_contents(mut self, contents: BTreeMap<String, Vec<u8>>) -> Self {
        self.contents = contents;
        self
    }
}
