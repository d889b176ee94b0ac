use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use gk_gate::{GateConfig, GateError, GateOutcome, Gatekeeper, Invocation, InvocationKind};
use gk_index::{IndexStore, JsonIndexFile};
use gk_store::GitCliStore;
use gk_types::{RefName, Revision};

use crate::cli::*;

/// Configuration file looked up inside the git directory.
pub const CONFIG_FILE: &str = "gatekeeper.toml";

/// Staged trees carry no signature, so hook-script changes never pass the
/// local check.
const PRE_COMMIT_HOOK_NOTE: &str = "Changes to the gatekeeper hook scripts are always refused here: a staged
tree cannot carry a signature. Commit them with `git commit --no-verify`
and push them as a signed commit; the server-side check verifies it.";

/// How a command ended when it did not fail outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Accepted,
    Rejected,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Accepted => ExitCode::SUCCESS,
            Status::Rejected => ExitCode::from(1),
        }
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<Status> {
    let store = GitCliStore::open(&cli.repo)
        .with_context(|| format!("opening repository at {}", cli.repo.display()))?;
    let config = load_config(cli.config.as_deref(), store.git_dir())?;

    match cli.command {
        Command::PreCommit => cmd_pre_commit(&store, config),
        Command::PreReceive => cmd_pre_receive(&store, config, io::stdin().lock()),
        Command::Run(args) => cmd_run(&store, config, args),
        Command::Check(args) => cmd_check(&store, config, args),
        Command::Index(args) => cmd_index(&store, &config, args),
        Command::Init(args) => cmd_init(&store, &config, args),
    }
}

fn load_config(explicit: Option<&Path>, git_dir: &Path) -> anyhow::Result<GateConfig> {
    let path = explicit.map_or_else(|| git_dir.join(CONFIG_FILE), Path::to_path_buf);
    Ok(GateConfig::load(&path)?)
}

fn gatekeeper(store: &GitCliStore, config: GateConfig) -> anyhow::Result<(Gatekeeper, JsonIndexFile)> {
    let index = JsonIndexFile::new(config.index_path_in(store.git_dir()));
    let gate = Gatekeeper::with_default_stages(config, Arc::new(store.clone()))?;
    Ok((gate, index))
}

fn cmd_pre_commit(store: &GitCliStore, config: GateConfig) -> anyhow::Result<Status> {
    let (gate, index) = gatekeeper(store, config)?;
    let old = store.resolve("HEAD")?.unwrap_or_else(Revision::null);
    let new = store.write_index_tree()?;
    let branch = store.current_branch()?.unwrap_or_else(|| "HEAD".to_string());

    let outcome = gate.run(&Invocation::commit(old, new, branch), &index)?;
    Ok(report(&outcome))
}

fn cmd_pre_receive(store: &GitCliStore, config: GateConfig, input: impl BufRead) -> anyhow::Result<Status> {
    let (gate, index) = gatekeeper(store, config)?;
    let mut invocations = Vec::new();

    for line in input.lines() {
        let line = line.context("reading ref updates from stdin")?;
        let Some((old, new, refname)) = parse_ref_update(&line)? else {
            continue;
        };
        if new.is_null() {
            tracing::info!(%refname, "ref deletion accepted without evaluation");
            continue;
        }
        invocations.push(Invocation::receive(old, new, refname.branch()));
    }
    receive_updates(&gate, &index, &invocations)
}

/// Judge every ref update of one push, then project all or nothing.
///
/// Git refuses the whole push when any update fails, so the index is only
/// touched once every update has been accepted.
fn receive_updates(
    gate: &Gatekeeper,
    index: &dyn IndexStore,
    invocations: &[Invocation],
) -> anyhow::Result<Status> {
    let outcomes = invocations
        .iter()
        .map(|invocation| gate.evaluate(invocation))
        .collect::<Result<Vec<_>, _>>()?;

    let mut status = Status::Accepted;
    for outcome in &outcomes {
        if report(outcome) == Status::Rejected {
            status = Status::Rejected;
        }
    }
    if status == Status::Rejected {
        tracing::info!(refs = outcomes.len(), "push rejected; index left unchanged");
        return Ok(status);
    }

    for (invocation, mut outcome) in invocations.iter().zip(outcomes) {
        gate.project(invocation, &mut outcome, index)?;
    }
    Ok(status)
}

fn cmd_run(store: &GitCliStore, config: GateConfig, args: RunArgs) -> anyhow::Result<Status> {
    let (gate, index) = gatekeeper(store, config)?;
    let old = match args.old.as_deref() {
        Some(expr) => resolve(store, expr)?,
        None => Revision::null(),
    };
    let new = resolve(store, &args.new)?;
    let kind = match args.kind {
        KindArg::Commit => InvocationKind::Commit,
        KindArg::Receive => InvocationKind::Receive,
    };

    let mut invocation = Invocation::new(kind, old, new, args.branch);
    if let Some(path) = &args.contents {
        invocation = invocation.with_contents(read_contents(path)?);
    }
    Ok(report(&gate.run(&invocation, &index)?))
}

fn cmd_check(store: &GitCliStore, config: GateConfig, args: CheckArgs) -> anyhow::Result<Status> {
    let (gate, _) = gatekeeper(store, config)?;
    let revision = resolve(store, &args.revision)?;
    let verdict = gate.check_tree(&revision)?;

    if verdict.ok {
        println!("{} {} metadata is valid", "✓".green().bold(), revision.short().yellow());
        return Ok(Status::Accepted);
    }
    for line in verdict.violations() {
        println!("  {} {line}", "✗".red());
    }
    Ok(Status::Rejected)
}

fn cmd_index(store: &GitCliStore, config: &GateConfig, args: IndexArgs) -> anyhow::Result<Status> {
    let file = JsonIndexFile::new(config.index_path_in(store.git_dir()));
    let index = file.load()?;
    match args.action {
        IndexAction::List { branch } => {
            let entries: Vec<_> = match branch.as_deref() {
                Some(name) => index.branch(name).collect(),
                None => index.iter().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(Status::Accepted)
}

fn cmd_init(store: &GitCliStore, config: &GateConfig, args: InitArgs) -> anyhow::Result<Status> {
    let paths = config.control_paths();
    let root = store.repo_path();

    let mut files = vec![(
        root.join(&paths.validation_program),
        gk_sandbox::REFERENCE_POLICY.to_string(),
    )];
    for hook in ["pre-commit", "pre-receive"] {
        let control_hook = format!("{}/hooks/{hook}", paths.control_dir);
        files.push((root.join(control_hook), shim(hook)));
        if args.install_hooks {
            files.push((store.git_dir().join("hooks").join(hook), shim(hook)));
        }
    }

    for (path, contents) in files {
        if write_file(&path, &contents, args.force)? {
            println!("  {} {}", "created:".green(), path.display());
        } else {
            println!("  {} {} (exists)", "skipped:".yellow(), path.display());
        }
    }
    println!("{} Gatekeeper initialized in {}", "✓".green().bold(), root.display());
    println!("{}", "Note:".yellow().bold());
    for line in PRE_COMMIT_HOOK_NOTE.lines() {
        println!("  {line}");
    }
    Ok(Status::Accepted)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Follow-up hint for a fatal error. Configuration problems will fail the
/// same way on every retry; store failures may be transient.
pub fn error_hint(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<GateError>() {
        Some(e) if e.is_configuration() => {
            "fix the gatekeeper configuration or invocation; retrying will not help"
        }
        _ => "the repository or index could not be read; the change was not evaluated",
    }
}

/// Print the outcome: confirmation on stdout, violations on stderr.
fn report(outcome: &GateOutcome) -> Status {
    if outcome.is_accepted() {
        println!("{} {}", "✓".green().bold(), outcome.message());
        return Status::Accepted;
    }
    eprintln!(
        "{} {} rejected on {}",
        "✗".red().bold(),
        outcome.kind,
        outcome.branch.yellow()
    );
    for line in outcome.message().lines() {
        eprintln!("  {line}");
    }
    Status::Rejected
}

fn resolve(store: &GitCliStore, expr: &str) -> anyhow::Result<Revision> {
    store
        .resolve(expr)?
        .ok_or_else(|| anyhow!("unknown revision: {expr}"))
}

/// Parse one `<old> <new> <ref>` line. Blank lines yield `None`.
fn parse_ref_update(line: &str) -> anyhow::Result<Option<(Revision, Revision, RefName)>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [] => Ok(None),
        [old, new, refname] => Ok(Some((
            Revision::parse(old)?,
            Revision::parse(new)?,
            RefName::parse(refname)?,
        ))),
        _ => bail!("malformed ref update line: {line:?}"),
    }
}

/// Load a `{"path": "contents"}` JSON object.
fn read_contents(path: &Path) -> anyhow::Result<BTreeMap<String, Vec<u8>>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let map: BTreeMap<String, String> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(map.into_iter().map(|(k, v)| (k, v.into_bytes())).collect())
}

fn shim(hook: &str) -> String {
    let note = if hook == "pre-commit" {
        PRE_COMMIT_HOOK_NOTE
            .lines()
            .map(|line| format!("# {line}\n"))
            .collect::<String>()
    } else {
        String::new()
    };
    format!("#!/bin/sh\n{note}exec gatekeeper {hook} \"$@\"\n")
}

/// Write `contents` unless the file exists and `force` is off.
/// Returns whether the file was written.
fn write_file(path: &Path, contents: &str, force: bool) -> anyhow::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    if contents.starts_with("#!") {
        make_executable(path)?;
    }
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("marking {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
