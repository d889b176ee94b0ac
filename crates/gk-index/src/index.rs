//! The in-memory metadata index.
//!
//! [`MetadataIndex`] is a `BTreeMap<IndexKey, IndexEntry>`; persistence is
//! the job of an [`IndexStore`](crate::IndexStore).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gk_policy::Document;
use serde::{Deserialize, Serialize};

use crate::entry::{IndexEntry, IndexKey};

/// Ordered collection of index entries, at most one per key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataIndex {
    entries: BTreeMap<IndexKey, IndexEntry>,
}

/// On-disk shape: one object holding a single array.
#[derive(Serialize, Deserialize)]
pub(crate) struct IndexDocument {
    #[serde(default)]
    pub(crate) entries: Vec<IndexEntry>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &IndexKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Entries of one branch in directory order.
    pub fn branch<'a>(&'a self, branch: &'a str) -> impl Iterator<Item = &'a IndexEntry> {
        self.entries
            .iter()
            .filter(move |(key, _)| key.branch == branch)
            .map(|(_, entry)| entry)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Replace the entry for `key` with `document`.
    ///
    /// The previous entry's `_created_at` is carried over; everything else
    /// is replaced, not merged. `_updated_at` is set to `now`.
    pub fn upsert(&mut self, key: IndexKey, document: Document, now: DateTime<Utc>) -> &IndexEntry {
        let created_at = self.entries.get(&key).map_or(now, |prior| prior.created_at);
        let entry = IndexEntry::new(key.clone(), document, created_at, now);
        self.entries.insert(key.clone(), entry);
        &self.entries[&key]
    }

    /// Remove the entry for `key`, if present.
    pub fn remove(&mut self, key: &IndexKey) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    // ---------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------

    /// Build from decoded entries; a later duplicate key wins.
    pub(crate) fn from_document(doc: IndexDocument) -> Self {
        let entries = doc.entries.into_iter().map(|e| (e.key(), e)).collect();
        Self { entries }
    }

    pub(crate) fn to_document(&self) -> IndexDocument {
        IndexDocument {
            entries: self.entries.values().cloned().collect(),
        }
    }

    /// Encode as the `{"entries": [...]}` JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_document())
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self::from_document)
    }
}
