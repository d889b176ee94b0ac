use gk_policy::PathPolicy;

use crate::error::GateError;
use crate::stage::{GateStage, StageContext, StageDecision};

/// Whitelist stage: every changed path, deletions included, must match.
pub struct PathStage {
    policy: PathPolicy,
}

impl PathStage {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

impl GateStage for PathStage {
    fn name(&self) -> &str {
        "paths"
    }

    fn evaluate(&self, context: &StageContext<'_>) -> Result<StageDecision, GateError> {
        Ok(self.policy.check(context.changes).into())
    }
}
