use std::time::Instant;

use gk_store::{StoreResult, TreeReader};
use gk_types::{ChangeEntry, ValidationVerdict};
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope};

use crate::host::{self, Console};
use crate::limits::SandboxLimits;
use crate::report::{FailureKind, RunOutcome, SandboxRun};

/// Name of the script function called as the policy entry point.
pub const ENTRY_POINT: &str = "validate";

/// Operations between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Runs policy scripts in a fresh, capability-scoped engine per call.
#[derive(Clone, Debug, Default)]
pub struct PolicySandbox {
    limits: SandboxLimits,
}

impl PolicySandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Load the program at `program_path` through `reader` and run it.
    ///
    /// Only a failure to read the program is an error; everything that goes
    /// wrong inside the script becomes a failed verdict.
    pub fn evaluate_at(
        &self,
        program_path: &str,
        changes: &[ChangeEntry],
        reader: &TreeReader,
    ) -> StoreResult<SandboxRun> {
        let program = reader.read(program_path)?;
        Ok(self.evaluate(program.as_deref(), changes, reader))
    }

    /// Run `program` against `changes`. `None` accepts unconditionally.
    pub fn evaluate(
        &self,
        program: Option<&[u8]>,
        changes: &[ChangeEntry],
        reader: &TreeReader,
    ) -> SandboxRun {
        let Some(bytes) = program else {
            tracing::debug!("no policy program; accepting");
            return SandboxRun::no_program();
        };

        let started = Instant::now();
        let console = Console::default();
        let mut run = match std::str::from_utf8(bytes) {
            Ok(source) => self.execute(source, changes, reader, &console, started),
            Err(_) => SandboxRun::failed(FailureKind::Load, "policy program is not valid UTF-8"),
        };
        run.logs = std::mem::take(&mut *console.lock().expect("lock poisoned"));
        run.elapsed = started.elapsed();

        match run.failure() {
            Some(kind) => tracing::warn!(
                %kind,
                elapsed_ms = run.elapsed.as_millis() as u64,
                "policy script failed"
            ),
            None => tracing::debug!(
                ok = run.verdict.ok,
                elapsed_ms = run.elapsed.as_millis() as u64,
                "policy script finished"
            ),
        }
        run
    }

    fn engine(
        &self,
        started: Instant,
        changes: &[ChangeEntry],
        reader: &TreeReader,
        console: &Console,
    ) -> Engine {
        let limits = &self.limits;
        let mut engine = Engine::new();

        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_expr_depths(limits.max_expr_depth.0, limits.max_expr_depth.1);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        let deadline = started + limits.timeout;
        engine.on_progress(move |ops| {
            if ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                Some(Dynamic::from("deadline exceeded".to_string()))
            } else {
                None
            }
        });

        host::register(
            &mut engine,
            changes,
            reader.clone(),
            limits.metadata_filenames.clone(),
            console,
        );
        engine
    }

    fn execute(
        &self,
        source: &str,
        changes: &[ChangeEntry],
        reader: &TreeReader,
        console: &Console,
        started: Instant,
    ) -> SandboxRun {
        let engine = self.engine(started, changes, reader, console);

        let ast = match engine.compile(source) {
            Ok(ast) => ast,
            Err(e) => {
                return SandboxRun::failed(FailureKind::Load, format!("failed to compile policy: {e}"))
            }
        };

        let arities: Vec<usize> = ast
            .iter_functions()
            .filter(|f| f.name == ENTRY_POINT)
            .map(|f| f.params.len())
            .collect();
        let has_entry = arities.contains(&0);
        if !arities.is_empty() && !has_entry {
            return SandboxRun::failed(
                FailureKind::NoVerdict,
                format!("{ENTRY_POINT}() must take no parameters"),
            );
        }

        let mut scope = Scope::new();
        let result = if has_entry {
            engine.call_fn::<Dynamic>(&mut scope, &ast, ENTRY_POINT, ())
        } else {
            engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        };

        match result {
            Ok(value) => self.interpret(value, has_entry),
            Err(err) if timed_out(&err) => SandboxRun::failed(
                FailureKind::Timeout,
                format!("sandbox timed out after {} ms", self.limits.timeout.as_millis()),
            ),
            Err(err) => SandboxRun::failed(FailureKind::Runtime, err),
        }
    }

    fn interpret(&self, value: Dynamic, from_entry: bool) -> SandboxRun {
        if value.is::<FnPtr>() {
            return SandboxRun::failed(
                FailureKind::Deferred,
                "policy returned a deferred result; verdicts must be returned synchronously",
            );
        }

        if !from_entry && !value.is_map() && !value.is::<bool>() {
            tracing::debug!("policy has no entry point and no top-level verdict; accepting");
            return completed(ValidationVerdict::pass());
        }

        match verdict_from(value) {
            Ok(verdict) => completed(verdict),
            Err(reason) => SandboxRun::failed(FailureKind::NoVerdict, reason),
        }
    }
}

fn completed(verdict: ValidationVerdict) -> SandboxRun {
    SandboxRun {
        verdict,
        outcome: RunOutcome::Completed,
        logs: Vec::new(),
        elapsed: Default::default(),
    }
}

fn verdict_from(value: Dynamic) -> Result<ValidationVerdict, String> {
    if let Ok(ok) = value.as_bool() {
        return Ok(if ok {
            ValidationVerdict::pass()
        } else {
            ValidationVerdict::fail("")
        });
    }

    if value.is_map() {
        let map = value.cast::<Map>();
        let ok = match map.get("ok") {
            Some(ok) => ok
                .as_bool()
                .map_err(|_| "verdict field 'ok' must be a bool".to_string())?,
            None => return Err("verdict map has no 'ok' field".to_string()),
        };
        if ok {
            return Ok(ValidationVerdict::pass());
        }
        let message = map
            .get("message")
            .and_then(|m| m.clone().into_string().ok())
            .unwrap_or_default();
        return Ok(ValidationVerdict::fail(message));
    }

    Err(format!("policy did not return a verdict (got {})", value.type_name()))
}

fn timed_out(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => timed_out(inner),
        EvalAltResult::ErrorInModule(_, inner, _) => timed_out(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use gk_store::InMemoryRepository;
    use gk_types::Revision;

    use crate::report::FAILURE_PREFIX;
    use crate::REFERENCE_POLICY;

    const VALID_META: &str = "title: Test Movie\nrelease_date: 2026-01-06\ngenre: [Action]\n";

    fn reader_with(files: &[(&str, &str)]) -> TreeReader {
        let repo = InMemoryRepository::new();
        let rev = Revision::parse("new").unwrap();
        repo.insert_revision(&rev, files.iter().map(|(p, c)| (p.to_string(), c.to_string())));
        TreeReader::new(Arc::new(repo), rev)
    }

    fn run(script: &str, changes: &[ChangeEntry], reader: &TreeReader) -> SandboxRun {
        PolicySandbox::default().evaluate(Some(script.as_bytes()), changes, reader)
    }

    fn run_plain(script: &str) -> SandboxRun {
        run(script, &[], &reader_with(&[]))
    }

    // -----------------------------------------------------------------------
    // Entry point and verdict shapes
    // -----------------------------------------------------------------------

    #[test]
    fn missing_program_accepts() {
        let reader = reader_with(&[]);
        let run = PolicySandbox::default()
            .evaluate_at(".gatekeeper/validate.rhai", &[ChangeEntry::added("x")], &reader)
            .unwrap();
        assert!(run.verdict.ok);
        assert_eq!(run.outcome, RunOutcome::NoProgram);
    }

    #[test]
    fn program_loaded_from_tree() {
        let reader = reader_with(&[(".gatekeeper/validate.rhai", "fn validate() { #{ ok: false, message: \"from tree\" } }")]);
        let run = PolicySandbox::default()
            .evaluate_at(".gatekeeper/validate.rhai", &[], &reader)
            .unwrap();
        assert_eq!(run.verdict.message.as_deref(), Some("from tree"));
    }

    #[test]
    fn map_verdicts() {
        assert!(run_plain("fn validate() { #{ ok: true } }").verdict.ok);

        let failed = run_plain("fn validate() { #{ ok: false, message: \"a\\nb\" } }");
        assert_eq!(failed.outcome, RunOutcome::Completed);
        assert_eq!(failed.verdict.violations(), vec!["a", "b"]);
    }

    #[test]
    fn bool_verdicts() {
        assert!(run_plain("fn validate() { true }").verdict.ok);
        let failed = run_plain("fn validate() { false }");
        assert!(!failed.verdict.ok);
        assert_eq!(
            failed.verdict.message.as_deref(),
            Some(gk_types::verdict::DEFAULT_FAILURE_MESSAGE)
        );
    }

    #[test]
    fn unit_return_is_not_a_verdict() {
        let run = run_plain("fn validate() { }");
        assert_eq!(run.failure(), Some(FailureKind::NoVerdict));
        let message = run.verdict.message.unwrap();
        assert!(message.starts_with(FAILURE_PREFIX));
        assert!(message.contains("did not return a verdict"));
    }

    #[test]
    fn map_without_ok_is_not_a_verdict() {
        let run = run_plain("fn validate() { #{ message: \"hi\" } }");
        assert_eq!(run.failure(), Some(FailureKind::NoVerdict));
    }

    #[test]
    fn entry_point_with_parameters_is_rejected() {
        let run = run_plain("fn validate(changes) { true }");
        assert_eq!(run.failure(), Some(FailureKind::NoVerdict));
    }

    #[test]
    fn precomputed_top_level_verdict() {
        let run = run_plain("let verdict = #{ ok: false, message: \"precomputed\" };\nverdict");
        assert_eq!(run.verdict.message.as_deref(), Some("precomputed"));
    }

    #[test]
    fn precomputed_top_level_bool_verdict() {
        let run = run_plain("let verdict = false;\nverdict");
        assert!(!run.verdict.ok);
        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(run.verdict.message.as_deref(), Some(gk_types::verdict::DEFAULT_FAILURE_MESSAGE));

        assert!(run_plain("let verdict = true;\nverdict").verdict.ok);
    }

    #[test]
    fn script_without_verdict_accepts() {
        let run = run_plain("let x = 1;\nx + 1");
        assert!(run.verdict.ok);
        assert_eq!(run.outcome, RunOutcome::Completed);
    }

    #[test]
    fn function_pointer_is_a_deferred_result() {
        let run = run_plain("fn helper() { true }\nfn validate() { Fn(\"helper\") }");
        let kind = run.failure().unwrap();
        assert_eq!(kind, FailureKind::Deferred);
        assert!(kind.is_configuration_error());
        assert!(run.verdict.message.unwrap().starts_with(FAILURE_PREFIX));
    }

    // -----------------------------------------------------------------------
    // Error containment
    // -----------------------------------------------------------------------

    #[test]
    fn thrown_error_becomes_failed_verdict() {
        let run = run_plain("fn validate() { throw \"boom\"; }");
        assert_eq!(run.failure(), Some(FailureKind::Runtime));
        let message = run.verdict.message.unwrap();
        assert!(message.starts_with(FAILURE_PREFIX));
        assert!(message.contains("boom"));
    }

    #[test]
    fn syntax_error_becomes_failed_verdict() {
        let run = run_plain("fn validate( {");
        assert_eq!(run.failure(), Some(FailureKind::Load));
    }

    #[test]
    fn non_utf8_program_becomes_failed_verdict() {
        let run = PolicySandbox::default().evaluate(Some(&[0xff, 0x00]), &[], &reader_with(&[]));
        assert_eq!(run.failure(), Some(FailureKind::Load));
    }

    #[test]
    fn runaway_script_times_out() {
        let sandbox = PolicySandbox::new(SandboxLimits::default().with_timeout(Duration::from_millis(50)));
        let run = sandbox.evaluate(
            Some(b"fn validate() { let x = 0; loop { x += 1; } }"),
            &[],
            &reader_with(&[]),
        );
        assert_eq!(run.failure(), Some(FailureKind::Timeout));
        assert!(run.verdict.message.unwrap().contains("timed out"));
        assert!(run.elapsed < Duration::from_secs(10));
    }

    #[test]
    fn ambient_capabilities_are_absent() {
        assert!(run_plain("import \"std\" as s;\nfn validate() { true }").failure().is_some());
        assert!(run_plain("fn validate() { eval(\"true\") }").failure().is_some());
    }

    // -----------------------------------------------------------------------
    // Host API
    // -----------------------------------------------------------------------

    #[test]
    fn list_staged_is_a_fresh_snapshot() {
        let changes = vec![ChangeEntry::added("a.md"), ChangeEntry::deleted("x/meta.yaml")];
        let script = r#"
            fn validate() {
                let first = list_staged();
                first.clear();
                let second = list_staged();
                second.len() == 2 && second[0].status == "A" && second[1].status == "D"
                    && second[1].path == "x/meta.yaml"
            }
        "#;
        assert!(run(script, &changes, &reader_with(&[])).verdict.ok);
    }

    #[test]
    fn read_file_returns_text_or_unit() {
        let reader = reader_with(&[("data/a.md", "hello")]);
        let script = r#"
            fn validate() {
                read_file("data/a.md") == "hello" && type_of(read_file("missing")) == "()"
            }
        "#;
        assert!(run(script, &[], &reader).verdict.ok);
    }

    #[test]
    fn read_file_prefers_pre_resolved_contents() {
        let mut overrides = BTreeMap::new();
        overrides.insert("data/a.md".to_string(), b"override".to_vec());
        let reader = reader_with(&[("data/a.md", "store")]).with_overrides(overrides);
        assert!(run("fn validate() { read_file(\"data/a.md\") == \"override\" }", &[], &reader).verdict.ok);
    }

    #[test]
    fn console_output_is_captured() {
        let run = run_plain("print(\"top\");\nfn validate() { print(\"inside\"); debug(\"dbg\"); true }");
        assert!(run.verdict.ok);
        assert_eq!(run.logs[0], "top");
        assert_eq!(run.logs[1], "inside");
        assert!(run.logs[2].contains("dbg"));
    }

    #[test]
    fn schema_helpers_are_available() {
        let script = r#"
            fn validate() {
                let doc = parse_document("title: X\nrelease_date: 2024/01/15\ngenre: []");
                type_of(check_title(doc, "m")) == "()"
                    && type_of(check_release_date(doc, "m")) == "string"
                    && type_of(check_genre(doc, "m")) == "()"
                    && type_of(parse_document("  nested: no")) == "()"
                    && is_metadata_path("data/x/meta.yml")
            }
        "#;
        assert!(run_plain(script).verdict.ok);
    }

    // -----------------------------------------------------------------------
    // Reference policy script
    // -----------------------------------------------------------------------

    fn reference(meta: &str) -> SandboxRun {
        let path = "data/2026/test-movie/meta.yaml";
        let reader = reader_with(&[(path, meta)]);
        run(REFERENCE_POLICY, &[ChangeEntry::modified(path)], &reader)
    }

    #[test]
    fn reference_script_accepts_valid_document() {
        let run = reference(VALID_META);
        assert!(run.verdict.ok, "{:?}", run.verdict);
    }

    #[test]
    fn reference_script_rejects_bad_fields() {
        let run = reference("title: \"  \"\nrelease_date: 15-01-2024\ngenre: [1, 2]\n");
        assert_eq!(run.outcome, RunOutcome::Completed);
        let lines = run.verdict.violations();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.starts_with("data/2026/test-movie/meta.yaml")));
    }

    #[test]
    fn reference_script_release_dates() {
        for good in ["2024-01-15", "2024-02-30"] {
            let meta = format!("title: X\nrelease_date: \"{good}\"\ngenre: []\n");
            assert!(reference(&meta).verdict.ok, "{good}");
        }
        for bad in ["2024/01/15", "15-01-2024", "2024-1-15"] {
            let meta = format!("title: X\nrelease_date: \"{bad}\"\ngenre: []\n");
            assert!(!reference(&meta).verdict.ok, "{bad}");
        }
    }

    #[test]
    fn reference_script_skips_deletions_and_other_files() {
        let reader = reader_with(&[("data/x/description.md", "# not yaml")]);
        let changes = vec![
            ChangeEntry::deleted("data/y/meta.yaml"),
            ChangeEntry::added("data/x/description.md"),
        ];
        assert!(run(REFERENCE_POLICY, &changes, &reader).verdict.ok);
    }
}
