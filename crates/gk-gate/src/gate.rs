use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gk_index::{IndexProjector, IndexStore, ProjectionSummary};
use gk_policy::reference_policy;
use gk_signing::{SignatureGate, SignatureStatus};
use gk_store::{RevisionStore, TreeReader};
use gk_types::{ChangeEntry, Revision, ValidationVerdict};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::invocation::{Invocation, InvocationKind};
use crate::stage::{GateStage, StageContext, StageDecision, StageResult};
use crate::stages::{PathStage, SchemaStage, ScriptStage};

// ---------------------------------------------------------------------------
// Decision / GateOutcome
// ---------------------------------------------------------------------------

/// Final accept/reject decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    /// `reason` holds every violation, newline-joined.
    Rejected { reason: String },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// The outcome of running one invocation through the pipeline.
#[derive(Clone, Debug)]
pub struct GateOutcome {
    pub decision: Decision,
    pub kind: InvocationKind,
    pub branch: String,
    pub changes: Vec<ChangeEntry>,
    /// Per-stage results in evaluation order (empty in permissive mode).
    pub stage_results: Vec<StageResult>,
    /// Combined content verdict of all stages.
    pub verdict: ValidationVerdict,
    /// Hook paths touched by the changeset.
    pub hook_changes: Vec<String>,
    /// Present when a signature was checked.
    pub signature: Option<SignatureStatus>,
    /// A failed verdict was overridden by a valid signature.
    pub rescued: bool,
    /// Present when the index projector ran.
    pub index: Option<ProjectionSummary>,
    pub elapsed: Duration,
}

impl GateOutcome {
    /// Returns `true` if the changeset was accepted.
    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }

    /// One-line confirmation or the full rejection message.
    pub fn message(&self) -> String {
        match &self.decision {
            Decision::Accepted if self.rescued => format!(
                "{}: accepted {} change(s) on {} (validation overridden by signature)",
                self.kind,
                self.changes.len(),
                self.branch
            ),
            Decision::Accepted => format!(
                "{}: accepted {} change(s) on {}",
                self.kind,
                self.changes.len(),
                self.branch
            ),
            Decision::Rejected { reason } => reason.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gatekeeper
// ---------------------------------------------------------------------------

/// The gate pipeline: content stages, signature rules and index projection.
pub struct Gatekeeper {
    config: GateConfig,
    store: Arc<dyn RevisionStore>,
    stages: Vec<Box<dyn GateStage>>,
    signatures: SignatureGate,
    projector: IndexProjector,
}

impl Gatekeeper {
    /// A gate with no content stages. Use [`Self::add_stage`] to add some,
    /// or [`Self::with_default_stages`] for the standard pipeline.
    pub fn new(config: GateConfig, store: Arc<dyn RevisionStore>) -> Result<Self, GateError> {
        config.validate()?;
        let paths = config.control_paths();
        Ok(Self {
            signatures: SignatureGate::new(paths.signer_dirs.clone()),
            projector: IndexProjector::new(config.metadata_filenames.clone()),
            config,
            store,
            stages: Vec::new(),
        })
    }

    /// The standard pipeline: paths -> [schema] -> policy-script.
    pub fn with_default_stages(
        config: GateConfig,
        store: Arc<dyn RevisionStore>,
    ) -> Result<Self, GateError> {
        let mut gate = Self::new(config, store)?;
        gate.add_stage(Box::new(PathStage::new(gate.config.path_policy()?)));
        if gate.config.builtin_schema {
            gate.add_stage(Box::new(SchemaStage));
        }
        gate.add_stage(Box::new(ScriptStage::from_config(&gate.config)));
        Ok(gate)
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run `invocation`, projecting accepted changes into `index`.
    pub fn run(
        &self,
        invocation: &Invocation,
        index: &dyn IndexStore,
    ) -> Result<GateOutcome, GateError> {
        self.run_at(invocation, index, Utc::now())
    }

    /// [`Self::run`] with an explicit timestamp for index entries.
    pub fn run_at(
        &self,
        invocation: &Invocation,
        index: &dyn IndexStore,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome, GateError> {
        let mut outcome = self.evaluate(invocation)?;
        self.project_at(invocation, &mut outcome, index, now)?;
        Ok(outcome)
    }

    /// Decide `invocation` without touching any index.
    ///
    /// Callers that judge several ref updates as one unit evaluate them all
    /// first and project only once every update is accepted.
    pub fn evaluate(&self, invocation: &Invocation) -> Result<GateOutcome, GateError> {
        let started = Instant::now();
        if invocation.new.is_null() {
            return Err(GateError::Config("missing target revision".into()));
        }
        if invocation.branch.trim().is_empty() {
            return Err(GateError::Config("missing branch name".into()));
        }

        let changes = self
            .store
            .diff(&invocation.old, &invocation.new)
            .map_err(GateError::Extraction)?;
        tracing::info!(
            kind = %invocation.kind,
            branch = %invocation.branch,
            old = %invocation.old.short(),
            new = %invocation.new.short(),
            changes = changes.len(),
            "evaluating changeset"
        );

        let reader = self.reader(invocation);
        let stage_results = if self.config.permissive {
            tracing::debug!("permissive mode; content stages skipped");
            Vec::new()
        } else {
            let context = StageContext {
                invocation,
                changes: &changes,
                reader: &reader,
                config: &self.config,
            };
            self.run_stages(&context)?
        };
        let verdict = ValidationVerdict::from_violations(
            stage_results.iter().flat_map(|r| r.violations.iter().cloned()),
        );

        let hook_changes = self.hook_changes(&changes);
        let mut outcome = GateOutcome {
            decision: Decision::Accepted,
            kind: invocation.kind,
            branch: invocation.branch.clone(),
            changes,
            stage_results,
            verdict,
            hook_changes,
            signature: None,
            rescued: false,
            index: None,
            elapsed: Duration::ZERO,
        };

        let decision = self.decide(&mut outcome, &invocation.new);
        outcome.decision = decision;

        outcome.elapsed = started.elapsed();
        match &outcome.decision {
            Decision::Accepted => tracing::info!(
                rescued = outcome.rescued,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "changeset accepted"
            ),
            Decision::Rejected { reason } => tracing::info!(
                violations = reason.lines().count(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "changeset rejected"
            ),
        }
        Ok(outcome)
    }

    /// Project an evaluated outcome into `index`, stamped with the current
    /// time.
    pub fn project(
        &self,
        invocation: &Invocation,
        outcome: &mut GateOutcome,
        index: &dyn IndexStore,
    ) -> Result<(), GateError> {
        self.project_at(invocation, outcome, index, Utc::now())
    }

    /// [`Self::project`] with an explicit timestamp. Rejected outcomes never
    /// reach the projector.
    pub fn project_at(
        &self,
        invocation: &Invocation,
        outcome: &mut GateOutcome,
        index: &dyn IndexStore,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        if !outcome.is_accepted() {
            return Ok(());
        }
        let summary = self.projector.project(
            index,
            &outcome.changes,
            &self.reader(invocation),
            &invocation.branch,
            now,
        )?;
        outcome.index = Some(summary);
        Ok(())
    }

    /// Run the reference schema over every metadata file in `revision`.
    pub fn check_tree(&self, revision: &Revision) -> Result<ValidationVerdict, GateError> {
        let changes = self
            .store
            .diff(&Revision::null(), revision)
            .map_err(GateError::Extraction)?;
        let reader = TreeReader::new(Arc::clone(&self.store), revision.clone());
        Ok(reference_policy(
            &changes,
            &reader,
            self.config.metadata_filenames.as_slice(),
        )?)
    }

    fn run_stages(&self, context: &StageContext<'_>) -> Result<Vec<StageResult>, GateError> {
        let mut results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.evaluate(context)?;
            let elapsed = stage_start.elapsed();

            tracing::debug!(
                stage = stage.name(),
                passed = decision.is_pass(),
                violations = decision.violations().len(),
                "stage evaluated"
            );
            results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: decision.is_pass(),
                violations: match decision {
                    StageDecision::Pass => Vec::new(),
                    StageDecision::Fail { violations } => violations,
                },
                elapsed,
            });
        }
        Ok(results)
    }

    fn reader(&self, invocation: &Invocation) -> TreeReader {
        TreeReader::new(Arc::clone(&self.store), invocation.new.clone())
            .with_overrides(invocation.contents.clone())
    }

    fn hook_changes(&self, changes: &[ChangeEntry]) -> Vec<String> {
        let paths = self.config.control_paths();
        let hooks = paths.hook_paths();
        changes
            .iter()
            .filter(|c| hooks.contains(&c.path.as_str()))
            .map(|c| c.path.clone())
            .collect()
    }

    /// Apply the verdict and signature rules.
    ///
    /// - Hook-path changes need a valid signature, whatever the verdict.
    /// - A failed verdict is final at commit time.
    /// - At receive time a valid signature overrides a failed verdict; if the
    ///   signature does not verify, the original verdict message stands.
    fn decide(&self, outcome: &mut GateOutcome, revision: &Revision) -> Decision {
        let content_ok = outcome.verdict.ok;
        let mandatory = !outcome.hook_changes.is_empty();
        let rescue = !content_ok && outcome.kind == InvocationKind::Receive;

        if mandatory || rescue {
            outcome.signature = Some(self.signatures.verify(self.store.as_ref(), revision));
        }
        let signed = outcome
            .signature
            .as_ref()
            .is_some_and(SignatureStatus::is_verified);

        let mut lines: Vec<String> = outcome
            .verdict
            .violations()
            .into_iter()
            .map(str::to_string)
            .collect();

        if mandatory && !signed {
            if let Some(status) = &outcome.signature {
                for path in &outcome.hook_changes {
                    lines.push(format!("Signature required: {path} changed ({status})"));
                }
            }
            return Decision::Rejected {
                reason: lines.join("\n"),
            };
        }

        if content_ok {
            return Decision::Accepted;
        }
        if rescue && signed {
            tracing::info!("failed verdict overridden by a valid signature");
            outcome.rescued = true;
            return Decision::Accepted;
        }
        Decision::Rejected {
            reason: lines.join("\n"),
        }
    }
}
