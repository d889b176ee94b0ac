//! Built-in policy rules for the gatekeeper.
//!
//! This crate holds the pure, repository-independent parts of validation:
//! which paths may change at all, how metadata documents are parsed, and
//! which fields a metadata document must carry. The same functions back the
//! built-in reference policy stage and the host helpers exposed to policy
//! scripts.
//!
//! # Key Types
//!
//! - [`PathPolicy`] -- ordered whitelist of [`PathPattern`] globs
//! - [`Document`] -- a parsed metadata document
//! - [`reference_policy`] -- schema checks over every changed metadata file

pub mod document;
pub mod error;
pub mod glob;
pub mod schema;

pub use document::{is_metadata_path, parse_document, Document, DEFAULT_METADATA_FILENAMES};
pub use error::{PolicyError, PolicyResult};
pub use glob::{default_whitelist, PathPattern, PathPolicy};
pub use schema::{check_genre, check_metadata, check_release_date, check_title, reference_policy};
