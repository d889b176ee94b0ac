//! Sandboxed execution of repository-supplied policy scripts.
//!
//! Policy scripts are untrusted: they come from the very repository whose
//! changes they judge. They run in an embedded [`rhai`] engine that has no
//! filesystem, process, network or environment access. The only host
//! functions registered are the changeset snapshot, a tree reader pinned to
//! the new revision, console output, and the pure schema helpers from
//! `gk-policy`. Every run is bounded by a wall-clock deadline.
//!
//! # Entry point
//!
//! 1. A zero-argument `fn validate()` is called and must return a verdict.
//! 2. Without one, a top-level verdict (the script's final value, a map or
//!    a bool) is used.
//! 3. Otherwise the script accepts.
//!
//! A verdict is `#{ ok: bool, message: string }` or a plain `bool`. Anything
//! else, a thrown error, the deadline passing, or a returned function pointer
//! (a deferred result) produces a failed verdict prefixed with
//! [`FAILURE_PREFIX`].
//!
//! # Key Types
//!
//! - [`PolicySandbox`] -- configured engine factory, one fresh engine per run
//! - [`SandboxLimits`] -- deadline and resource bounds
//! - [`SandboxRun`] -- verdict plus captured console output

mod host;
pub mod limits;
pub mod report;
pub mod sandbox;

pub use limits::SandboxLimits;
pub use report::{FailureKind, RunOutcome, SandboxRun, FAILURE_PREFIX};
pub use sandbox::PolicySandbox;

/// Policy script equivalent to the built-in reference policy.
pub const REFERENCE_POLICY: &str = include_str!("../policies/reference.rhai");
