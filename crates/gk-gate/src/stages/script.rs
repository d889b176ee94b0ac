use gk_sandbox::{PolicySandbox, SandboxLimits};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{GateStage, StageContext, StageDecision};

/// Runs the repository's policy program in the sandbox.
///
/// The program is read at the new revision. Script failures of any kind
/// come back as violations, never as errors.
pub struct ScriptStage {
    sandbox: PolicySandbox,
    program_path: String,
}

impl ScriptStage {
    pub fn new(sandbox: PolicySandbox, program_path: impl Into<String>) -> Self {
        Self {
            sandbox,
            program_path: program_path.into(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        let limits = SandboxLimits::default()
            .with_timeout(config.sandbox_timeout())
            .with_metadata_filenames(config.metadata_filenames.clone());
        Self::new(
            PolicySandbox::new(limits),
            config.control_paths().validation_program,
        )
    }
}

impl GateStage for ScriptStage {
    fn name(&self) -> &str {
        "policy-script"
    }

    fn evaluate(&self, context: &StageContext<'_>) -> Result<StageDecision, GateError> {
        let run = self
            .sandbox
            .evaluate_at(&self.program_path, context.changes, context.reader)?;

        if let Some(kind) = run.failure() {
            if kind.is_configuration_error() {
                tracing::error!(program = %self.program_path, "policy program is misconfigured");
            }
        }
        for line in &run.logs {
            tracing::debug!(program = %self.program_path, "console: {line}");
        }
        Ok(run.verdict.into())
    }
}
