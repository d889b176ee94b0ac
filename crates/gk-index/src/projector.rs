//! Incremental projection of a changeset onto the index.

use chrono::{DateTime, Utc};
use gk_policy::{is_metadata_path, parse_document, DEFAULT_METADATA_FILENAMES};
use gk_store::TreeReader;
use gk_types::ChangeEntry;

use crate::entry::IndexKey;
use crate::error::IndexResult;
use crate::index::MetadataIndex;
use crate::store::IndexStore;

/// What one projection did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub upserted: usize,
    pub removed: usize,
    /// Metadata files that were absent or failed to parse.
    pub skipped: Vec<String>,
}

impl ProjectionSummary {
    /// Whether the index content changed.
    pub fn changed(&self) -> bool {
        self.upserted > 0 || self.removed > 0
    }
}

/// Applies changesets to a [`MetadataIndex`].
#[derive(Clone, Debug)]
pub struct IndexProjector {
    metadata_filenames: Vec<String>,
}

impl Default for IndexProjector {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_FILENAMES.iter().map(|s| s.to_string()))
    }
}

impl IndexProjector {
    pub fn new<I, S>(metadata_filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metadata_filenames: metadata_filenames.into_iter().map(Into::into).collect(),
        }
    }

    /// Apply `changes` in order.
    ///
    /// Deleted metadata files remove their directory's entry. Other metadata
    /// files are read through `reader` and upserted; a file that is absent
    /// or does not parse is skipped without failing the projection. Only a
    /// store read error is returned.
    pub fn apply(
        &self,
        index: &mut MetadataIndex,
        changes: &[ChangeEntry],
        reader: &TreeReader,
        branch: &str,
        now: DateTime<Utc>,
    ) -> IndexResult<ProjectionSummary> {
        let mut summary = ProjectionSummary::default();

        for change in changes {
            if !is_metadata_path(&change.path, self.metadata_filenames.as_slice()) {
                continue;
            }
            let key = IndexKey::new(branch, change.parent_dir());

            if change.status.is_deleted() {
                if index.remove(&key).is_some() {
                    tracing::debug!(%key, "index entry removed");
                    summary.removed += 1;
                }
                continue;
            }

            let Some(bytes) = reader.read(&change.path)? else {
                tracing::warn!(path = %change.path, "metadata file missing at new revision; skipped");
                summary.skipped.push(change.path.clone());
                continue;
            };
            match parse_document(&bytes) {
                Ok(document) => {
                    index.upsert(key.clone(), document, now);
                    tracing::debug!(%key, "index entry upserted");
                    summary.upserted += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %change.path, error = %e, "malformed metadata document; skipped");
                    summary.skipped.push(change.path.clone());
                }
            }
        }

        Ok(summary)
    }

    /// Load from `store`, apply, and save back if anything changed.
    pub fn project(
        &self,
        store: &dyn IndexStore,
        changes: &[ChangeEntry],
        reader: &TreeReader,
        branch: &str,
        now: DateTime<Utc>,
    ) -> IndexResult<ProjectionSummary> {
        let mut index = store.load()?;
        let summary = self.apply(&mut index, changes, reader, branch, now)?;
        if summary.changed() {
            store.save(&index)?;
        }
        tracing::info!(
            branch,
            upserted = summary.upserted,
            removed = summary.removed,
            skipped = summary.skipped.len(),
            "index projected"
        );
        Ok(summary)
    }
}
