//! Gate pipeline for the gatekeeper.
//!
//! Every proposed change, at local-commit or at receive time, passes through
//! the gate. The gate extracts the changeset between two revisions, runs the
//! content stages (path whitelist, optional built-in schema, the repository's
//! sandboxed policy program), applies the signature rules, and on acceptance
//! projects metadata documents into the index.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use gk_gate::{GateConfig, Gatekeeper, Invocation};
//! use gk_index::InMemoryIndexStore;
//! use gk_store::InMemoryRepository;
//! use gk_types::Revision;
//!
//! let repo = InMemoryRepository::new();
//! let tip = Revision::parse("tip").unwrap();
//! repo.insert_revision(&tip, [("data/2026/test-movie/meta.yaml", "title: Test Movie\n")]);
//!
//! let gate = Gatekeeper::with_default_stages(GateConfig::default(), Arc::new(repo)).unwrap();
//! let invocation = Invocation::receive(Revision::null(), tip, "main");
//! let outcome = gate.run(&invocation, &InMemoryIndexStore::new()).unwrap();
//! assert!(outcome.is_accepted());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod invocation;
pub mod stage;
pub mod stages;

// Re-exports for convenience.
pub use config::{ControlPaths, GateConfig};
pub use error::GateError;
pub use gate::{Decision, GateOutcome, Gatekeeper};
pub use invocation::{Invocation, InvocationKind};
pub use stage::{GateStage, StageContext, StageDecision, StageResult};
pub use stages::{PathStage, SchemaStage, ScriptStage};
