use gk_policy::reference_policy;

use crate::error::GateError;
use crate::stage::{GateStage, StageContext, StageDecision};

/// Built-in reference schema over every added or modified metadata file.
pub struct SchemaStage;

impl GateStage for SchemaStage {
    fn name(&self) -> &str {
        "schema"
    }

    fn evaluate(&self, context: &StageContext<'_>) -> Result<StageDecision, GateError> {
        let verdict = reference_policy(
            context.changes,
            context.reader,
            context.config.metadata_filenames.as_slice(),
        )?;
        Ok(verdict.into())
    }
}
