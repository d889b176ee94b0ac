//! Reference metadata schema.
//!
//! Each check takes a parsed document and a label (normally the file path)
//! and returns a violation message, or `None` when the field is valid.
//! `release_date` is checked against the `YYYY-MM-DD` shape only; calendar
//! validity is not checked.

use std::sync::LazyLock;

use gk_store::{StoreResult, TreeReader};
use gk_types::{ChangeEntry, ValidationVerdict};
use regex::Regex;
use serde_json::Value;

use crate::document::{is_metadata_path, parse_document, Document};

static RELEASE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date regex is valid"));

/// `title` must be a string that is non-empty after trimming.
pub fn check_title(doc: &Document, label: &str) -> Option<String> {
    match doc.get("title") {
        Some(Value::String(title)) if !title.trim().is_empty() => None,
        _ => Some(format!("{label}: 'title' must be a non-empty string")),
    }
}

/// `release_date` must be a string shaped `YYYY-MM-DD`.
pub fn check_release_date(doc: &Document, label: &str) -> Option<String> {
    match doc.get("release_date") {
        Some(Value::String(date)) if RELEASE_DATE.is_match(date) => None,
        _ => Some(format!("{label}: 'release_date' must match YYYY-MM-DD")),
    }
}

/// `genre` must be an array of strings; an empty array is valid.
pub fn check_genre(doc: &Document, label: &str) -> Option<String> {
    match doc.get("genre") {
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => None,
        _ => Some(format!("{label}: 'genre' must be an array of strings")),
    }
}

/// Every reference check, in field order.
pub fn check_metadata(doc: &Document, label: &str) -> Vec<String> {
    [
        check_title(doc, label),
        check_release_date(doc, label),
        check_genre(doc, label),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Run the reference schema over every added or modified metadata file.
///
/// A file that cannot be read or parsed is itself a violation here; only the
/// index projector treats malformed documents as skippable.
pub fn reference_policy<S: AsRef<str>>(
    changes: &[ChangeEntry],
    reader: &TreeReader,
    metadata_filenames: &[S],
) -> StoreResult<ValidationVerdict> {
    let mut violations = Vec::new();

    for change in changes {
        if change.status.is_deleted() || !is_metadata_path(&change.path, metadata_filenames) {
            continue;
        }
        let Some(bytes) = reader.read(&change.path)? else {
            violations.push(format!("{}: file not found", change.path));
            continue;
        };
        match parse_document(&bytes) {
            Ok(doc) => violations.extend(check_metadata(&doc, &change.path)),
            Err(e) => violations.push(format!("{}: could not parse document: {e}", change.path)),
        }
    }

    tracing::debug!(
        checked = changes.len(),
        violations = violations.len(),
        "reference policy evaluated"
    );
    Ok(ValidationVerdict::from_violations(violations))
}
