//! Snapshot-level diff: compare two flattened trees and produce a changeset.
//!
//! Used by the in-memory backend. The git backend delegates the same job to
//! `git diff-tree`, which produces the same path-ordered output.

use std::collections::BTreeMap;

use gk_types::ChangeEntry;

/// A flattened tree: full path to file contents.
pub type Snapshot = BTreeMap<String, Vec<u8>>;

/// Compare two snapshots.
///
/// Paths present only in `new` are added, paths present only in `old` are
/// deleted, and paths whose bytes differ are modified. The result is ordered
/// by path, matching `git diff-tree -r`.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> Vec<ChangeEntry> {
    let mut changes = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (Some((old_path, old_bytes)), Some((new_path, new_bytes))) => {
                if old_path == new_path {
                    if old_bytes != new_bytes {
                        changes.push(ChangeEntry::modified(old_path.as_str()));
                    }
                    old_iter.next();
                    new_iter.next();
                } else if old_path < new_path {
                    changes.push(ChangeEntry::deleted(old_path.as_str()));
                    old_iter.next();
                } else {
                    changes.push(ChangeEntry::added(new_path.as_str()));
                    new_iter.next();
                }
            }
            (Some((old_path, _)), None) => {
                changes.push(ChangeEntry::deleted(old_path.as_str()));
                old_iter.next();
            }
            (None, Some((new_path, _))) => {
                changes.push(ChangeEntry::added(new_path.as_str()));
                new_iter.next();
            }
            (None, None) => break,
        }
    }

    changes
}
