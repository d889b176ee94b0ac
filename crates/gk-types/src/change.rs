use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Kind of change recorded for one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

impl ChangeStatus {
    /// Parse a `git diff --name-status` letter.
    ///
    /// Type changes (`T`) are reported as modifications; the pipeline only
    /// distinguishes "content present" from "content removed".
    pub fn from_git_letter(letter: &str) -> Result<Self, TypeError> {
        match letter.chars().next() {
            Some('A') => Ok(Self::Added),
            Some('M') | Some('T') => Ok(Self::Modified),
            Some('D') => Ok(Self::Deleted),
            _ => Err(TypeError::UnknownStatus(letter.to_string())),
        }
    }

    /// Single-letter code, as exposed to policy programs.
    pub fn letter(&self) -> &'static str {
        match self {
            Self::Added => "A",
            Self::Modified => "M",
            Self::Deleted => "D",
        }
    }

    /// Returns `true` for deletions.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// One changed path between two revisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub status: ChangeStatus,
    pub path: String,
}

impl ChangeEntry {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }

    pub fn added(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Added, path)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Modified, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Deleted, path)
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Containing directory (`""` for a file at the tree root).
    pub fn parent_dir(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}
