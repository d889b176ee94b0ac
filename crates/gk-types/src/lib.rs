//! Foundation types for the gatekeeper.
//!
//! This crate provides the small set of value types that flow through the
//! whole validation pipeline. Every other gatekeeper crate depends on
//! `gk-types`.
//!
//! # Key Types
//!
//! - [`Revision`] -- A git revision identifier (commit or tree), with the
//!   all-zero "no previous revision" sentinel
//! - [`RefName`] -- A pushed ref and the branch name derived from it
//! - [`ChangeEntry`] / [`ChangeStatus`] -- One entry of a changeset
//! - [`ValidationVerdict`] -- Pass/fail outcome of one validation run

pub mod change;
pub mod error;
pub mod revision;
pub mod verdict;

pub use change::{ChangeEntry, ChangeStatus};
pub use error::TypeError;
pub use revision::{RefName, Revision};
pub use verdict::ValidationVerdict;
