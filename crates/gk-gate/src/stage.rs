use std::time::Duration;

use gk_store::TreeReader;
use gk_types::{ChangeEntry, ValidationVerdict};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::invocation::Invocation;

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single gate stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    Pass,
    /// One entry per violation; every stage reports all it finds.
    Fail { violations: Vec<String> },
}

impl StageDecision {
    /// Returns `true` if the decision is `Pass`.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns `true` if the decision is `Fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    pub fn violations(&self) -> &[String] {
        match self {
            Self::Pass => &[],
            Self::Fail { violations } => violations,
        }
    }
}

impl From<ValidationVerdict> for StageDecision {
    fn from(verdict: ValidationVerdict) -> Self {
        if verdict.ok {
            Self::Pass
        } else {
            Self::Fail {
                violations: verdict.violations().into_iter().map(str::to_string).collect(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    pub violations: Vec<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// StageContext
// ---------------------------------------------------------------------------

/// What every stage can see.
pub struct StageContext<'a> {
    pub invocation: &'a Invocation,
    pub changes: &'a [ChangeEntry],
    /// Reader pinned to the new revision, honoring pre-resolved contents.
    pub reader: &'a TreeReader,
    pub config: &'a GateConfig,
}

// ---------------------------------------------------------------------------
// GateStage trait
// ---------------------------------------------------------------------------

/// A single content check in the gate pipeline.
///
/// Every stage runs, in order; the pipeline collects all violations rather
/// than stopping at the first failing stage. Returning an error aborts the
/// whole run and is reserved for store failures.
///
/// The trait is object-safe and `Send + Sync` so stages can be stored in
/// a `Vec<Box<dyn GateStage>>`.
pub trait GateStage: Send + Sync {
    /// Human-readable name of this stage (e.g., "paths", "policy-script").
    fn name(&self) -> &str;

    fn evaluate(&self, context: &StageContext<'_>) -> Result<StageDecision, GateError>;
}
