use std::fmt;
use std::time::Duration;

use gk_types::ValidationVerdict;

/// Marker prepended to every sandbox failure message.
pub const FAILURE_PREFIX: &str = "Validation script error: ";

/// Why a policy run failed to produce a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The script is not valid UTF-8 or does not compile.
    Load,
    /// The script threw or hit a resource limit.
    Runtime,
    /// The wall-clock deadline passed.
    Timeout,
    /// The script returned a function pointer instead of a verdict.
    Deferred,
    /// The script returned something that is not a verdict.
    NoVerdict,
}

impl FailureKind {
    /// A deferred result means the policy itself is written wrong, not that
    /// the change is bad.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Runtime => "runtime",
            Self::Timeout => "timeout",
            Self::Deferred => "deferred",
            Self::NoVerdict => "no-verdict",
        };
        f.write_str(s)
    }
}

/// How a policy run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No program at the expected path; accepted unconditionally.
    NoProgram,
    /// The program ran and produced a verdict (passing or failing).
    Completed,
    /// The program could not produce a verdict.
    Failed(FailureKind),
}

/// Result of one sandboxed policy run.
#[derive(Clone, Debug)]
pub struct SandboxRun {
    pub verdict: ValidationVerdict,
    pub outcome: RunOutcome,
    /// Console output (`print` and `debug`) in emission order.
    pub logs: Vec<String>,
    pub elapsed: Duration,
}

impl SandboxRun {
    pub(crate) fn no_program() -> Self {
        Self {
            verdict: ValidationVerdict::pass(),
            outcome: RunOutcome::NoProgram,
            logs: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn failed(kind: FailureKind, detail: impl fmt::Display) -> Self {
        Self {
            verdict: ValidationVerdict::fail(format!("{FAILURE_PREFIX}{detail}")),
            outcome: RunOutcome::Failed(kind),
            logs: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.outcome {
            RunOutcome::Failed(kind) => Some(kind),
            _ => None,
        }
    }
}
