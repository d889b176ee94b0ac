use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "gatekeeper",
    about = "Validate commits and pushes against the repository's own policy",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <git-dir>/gatekeeper.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository to operate on
    #[arg(long, global = true, env = "GATEKEEPER_REPO", default_value = ".")]
    pub repo: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate the staged changes (pre-commit hook)
    PreCommit,
    /// Validate pushed ref updates read from stdin (pre-receive hook)
    PreReceive,
    /// Validate an explicit revision range
    Run(RunArgs),
    /// Check every metadata document in a revision against the reference schema
    Check(CheckArgs),
    /// Query the metadata index
    Index(IndexArgs),
    /// Install the reference policy and hook shims
    Init(InitArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Commit,
    Receive,
}

#[derive(Args)]
pub struct RunArgs {
    /// Previous revision (omit for a new branch)
    #[arg(long)]
    pub old: Option<String>,
    #[arg(long)]
    pub new: String,
    #[arg(long)]
    pub branch: String,
    #[arg(long, value_enum, default_value = "receive")]
    pub kind: KindArg,
    /// JSON object of path -> contents that takes precedence over the store
    #[arg(long)]
    pub contents: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(default_value = "HEAD")]
    pub revision: String,
}

#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand)]
pub enum IndexAction {
    /// Print index entries as JSON
    List {
        #[arg(long)]
        branch: Option<String>,
    },
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite files that already exist
    #[arg(long)]
    pub force: bool,
    /// Also link the shims into the repository's hooks directory
    #[arg(long)]
    pub install_hooks: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pre_commit() {
        let cli = Cli::try_parse_from(["gatekeeper", "pre-commit"]).unwrap();
        assert!(matches!(cli.command, Command::PreCommit));
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn parse_pre_receive_with_repo() {
        let cli = Cli::try_parse_from(["gatekeeper", "--repo", "/srv/movies.git", "pre-receive"]).unwrap();
        assert!(matches!(cli.command, Command::PreReceive));
        assert_eq!(cli.repo, PathBuf::from("/srv/movies.git"));
    }

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from([
            "gatekeeper", "run", "--new", "abc123", "--branch", "main", "--kind", "commit",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert!(args.old.is_none());
            assert_eq!(args.new, "abc123");
            assert_eq!(args.branch, "main");
            assert_eq!(args.kind, KindArg::Commit);
            assert!(args.contents.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_run_defaults_to_receive() {
        let cli = Cli::try_parse_from([
            "gatekeeper", "run", "--old", "a", "--new", "b", "--branch", "main",
            "--contents", "staged.json",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.kind, KindArg::Receive);
            assert_eq!(args.contents, Some(PathBuf::from("staged.json")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn run_requires_new_and_branch() {
        assert!(Cli::try_parse_from(["gatekeeper", "run", "--branch", "main"]).is_err());
        assert!(Cli::try_parse_from(["gatekeeper", "run", "--new", "b"]).is_err());
    }

    #[test]
    fn parse_check_default_revision() {
        let cli = Cli::try_parse_from(["gatekeeper", "check"]).unwrap();
        if let Command::Check(args) = cli.command {
            assert_eq!(args.revision, "HEAD");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_index_list() {
        let cli = Cli::try_parse_from(["gatekeeper", "index", "list", "--branch", "main"]).unwrap();
        if let Command::Index(IndexArgs { action: IndexAction::List { branch } }) = cli.command {
            assert_eq!(branch.as_deref(), Some("main"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_init_flags() {
        let cli = Cli::try_parse_from(["gatekeeper", "init", "--force", "--install-hooks"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.force);
            assert!(args.install_hooks);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["gatekeeper", "--verbose", "--config", "gk.toml", "pre-commit"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("gk.toml")));
    }
}
