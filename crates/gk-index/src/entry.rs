//! Index entry and key types.

use std::fmt;

use chrono::{DateTime, Utc};
use gk_policy::Document;
use serde::{Deserialize, Serialize};

/// Keys the index owns; any copy found in a source document is dropped.
pub const SYSTEM_FIELDS: &[&str] = &["_branch", "_meta_dir", "_created_at", "_updated_at"];

/// Composite key of an index entry.
///
/// Ordered by branch, then directory. Kept as a struct so no separator can
/// make two different keys collide.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey {
    pub branch: String,
    /// Directory holding the metadata file; `""` at the repository root.
    pub meta_dir: String,
}

impl IndexKey {
    pub fn new(branch: impl Into<String>, meta_dir: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            meta_dir: meta_dir.into(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.branch, self.meta_dir)
    }
}

/// A metadata document with the system fields the index maintains.
///
/// Serialized flat: the document's own keys side by side with `_branch`,
/// `_meta_dir`, `_created_at` and `_updated_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub document: Document,
    #[serde(rename = "_branch")]
    pub branch: String,
    #[serde(rename = "_meta_dir")]
    pub meta_dir: String,
    /// Set when the key is first indexed; carried across upserts.
    #[serde(rename = "_created_at")]
    pub created_at: DateTime<Utc>,
    /// Refreshed on every upsert.
    #[serde(rename = "_updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Build an entry, stripping any system keys from `document`.
    pub fn new(
        key: IndexKey,
        mut document: Document,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        for field in SYSTEM_FIELDS {
            document.remove(*field);
        }
        Self {
            document,
            branch: key.branch,
            meta_dir: key.meta_dir,
            created_at,
            updated_at,
        }
    }

    pub fn key(&self) -> IndexKey {
        IndexKey::new(self.branch.clone(), self.meta_dir.clone())
    }
}
