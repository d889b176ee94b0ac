use std::path::{Path, PathBuf};
use std::time::Duration;

use gk_policy::{default_whitelist, PathPolicy, DEFAULT_METADATA_FILENAMES};
use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Control directory used when the configuration names none.
pub const DEFAULT_CONTROL_DIR: &str = ".gatekeeper";

/// Index location relative to the git directory.
pub const DEFAULT_INDEX_PATH: &str = "gatekeeper/index.json";

/// Configuration for the gate pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Repository-relative directory holding the policy program, hook
    /// scripts and signer keys.
    pub control_dir: String,
    /// Paths that may change at all. The control directory is implied.
    pub whitelist: Vec<String>,
    /// File names treated as metadata documents.
    pub metadata_filenames: Vec<String>,
    /// Wall-clock budget for the policy program.
    pub sandbox_timeout_ms: u64,
    /// Also run the built-in reference schema as a stage.
    pub builtin_schema: bool,
    /// Index file; relative paths resolve against the git directory.
    pub index_path: Option<PathBuf>,
    /// When `true`, content stages are skipped. Hook-path changes still
    /// require a signature.
    pub permissive: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            control_dir: DEFAULT_CONTROL_DIR.to_string(),
            whitelist: default_whitelist(),
            metadata_filenames: DEFAULT_METADATA_FILENAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sandbox_timeout_ms: 2000,
            builtin_schema: false,
            index_path: None,
            permissive: false,
        }
    }
}

impl GateConfig {
    /// Content stages off; only the hook-path signature rule applies.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Default::default()
        }
    }

    /// Load from a TOML file. A missing file yields the default.
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(GateError::Config(format!("{}: {e}", path.display())));
            }
        };
        Self::from_toml(&text).map_err(|e| match e {
            GateError::Config(msg) => GateError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, GateError> {
        let config: Self = toml::from_str(text).map_err(|e| GateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), GateError> {
        let control = self.control_dir.trim_matches('/');
        if control.is_empty() || control.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(GateError::Config(format!(
                "control_dir '{}' must be a relative directory",
                self.control_dir
            )));
        }
        if self.metadata_filenames.iter().any(|n| n.is_empty() || n.contains('/')) {
            return Err(GateError::Config(
                "metadata_filenames must be plain file names".into(),
            ));
        }
        if self.sandbox_timeout_ms == 0 {
            return Err(GateError::Config("sandbox_timeout_ms must be positive".into()));
        }
        self.path_policy().map(|_| ())
    }

    /// Compile the whitelist. Everything under the control directory is
    /// always allowed, whatever the configured list says.
    pub fn path_policy(&self) -> Result<PathPolicy, GateError> {
        let control = format!("{}/**", self.control_paths().control_dir);
        let extra = (!self.whitelist.contains(&control)).then_some(control.as_str());
        let patterns = self.whitelist.iter().map(String::as_str).chain(extra);
        PathPolicy::from_patterns(patterns).map_err(|e| GateError::Config(e.to_string()))
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms)
    }

    pub fn control_paths(&self) -> ControlPaths {
        ControlPaths::new(&self.control_dir)
    }

    /// The index file for a repository whose git directory is `git_dir`.
    pub fn index_path_in(&self, git_dir: &Path) -> PathBuf {
        match &self.index_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => git_dir.join(path),
            None => git_dir.join(DEFAULT_INDEX_PATH),
        }
    }
}

/// Fixed locations inside the control directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlPaths {
    pub control_dir: String,
    /// The policy program run in the sandbox.
    pub validation_program: String,
    pub pre_commit_hook: String,
    pub pre_receive_hook: String,
    /// Signer key directories, most preferred first.
    pub signer_dirs: Vec<String>,
}

impl ControlPaths {
    pub fn new(control_dir: &str) -> Self {
        let control = control_dir.trim_matches('/').to_string();
        Self {
            validation_program: format!("{control}/validate.rhai"),
            pre_commit_hook: format!("{control}/hooks/pre-commit"),
            pre_receive_hook: format!("{control}/hooks/pre-receive"),
            signer_dirs: vec![format!("{control}/.ssh"), ".ssh".to_string()],
            control_dir: control,
        }
    }

    /// Paths whose change requires a signed commit.
    pub fn hook_paths(&self) -> [&str; 2] {
        [self.pre_commit_hook.as_str(), self.pre_receive_hook.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = GateConfig::default();
        assert_eq!(c.control_dir, ".gatekeeper");
        assert_eq!(c.sandbox_timeout(), Duration::from_secs(2));
        assert_eq!(c.metadata_filenames, vec!["meta.yaml", "meta.yml"]);
        assert!(!c.builtin_schema);
        assert!(!c.permissive);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn control_paths() {
        let paths = GateConfig::default().control_paths();
        assert_eq!(paths.validation_program, ".gatekeeper/validate.rhai");
        assert_eq!(
            paths.hook_paths(),
            [".gatekeeper/hooks/pre-commit", ".gatekeeper/hooks/pre-receive"]
        );
        assert_eq!(paths.signer_dirs, vec![".gatekeeper/.ssh", ".ssh"]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = GateConfig::from_toml("builtin_schema = true\nsandbox_timeout_ms = 500\n").unwrap();
        assert!(c.builtin_schema);
        assert_eq!(c.sandbox_timeout_ms, 500);
        assert_eq!(c.control_dir, ".gatekeeper");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        for bad in [
            "unknown_key = 1",
            "whitelist = [\"a**\"]",
            "control_dir = \"../outside\"",
            "sandbox_timeout_ms = 0",
            "metadata_filenames = [\"a/meta.yaml\"]",
        ] {
            let err = GateConfig::from_toml(bad).unwrap_err();
            assert!(err.is_configuration(), "{bad}");
        }
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let c = GateConfig::load(&dir.path().join("gatekeeper.toml")).unwrap();
        assert_eq!(c, GateConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.toml");
        std::fs::write(&path, "permissive = true\nwhitelist = [\"**\"]\n").unwrap();
        let c = GateConfig::load(&path).unwrap();
        assert!(c.permissive);
        assert_eq!(c.whitelist, vec!["**"]);
    }

    #[test]
    fn whitelist_follows_control_dir() {
        let c = GateConfig::from_toml("control_dir = \"policy\"\n").unwrap();
        let policy = c.path_policy().unwrap();
        assert!(policy.allows("policy/validate.rhai"));
        assert!(policy.allows("policy/hooks/pre-receive"));
        assert!(policy.allows("policy/.ssh/alice.pub"));
        assert!(!policy.allows("other/validate.rhai"));

        let narrowed = GateConfig::from_toml("control_dir = \"policy\"\nwhitelist = [\"data/**/meta.yaml\"]\n").unwrap();
        let policy = narrowed.path_policy().unwrap();
        assert!(policy.allows("policy/validate.rhai"));
        assert!(!policy.allows(".gatekeeper/validate.rhai"));

        // The default control directory is not listed twice.
        assert_eq!(GateConfig::default().path_policy().unwrap().patterns().len(), 4);
    }

    #[test]
    fn index_path_resolution() {
        let git_dir = Path::new("/repo/.git");
        let mut c = GateConfig::default();
        assert_eq!(c.index_path_in(git_dir), PathBuf::from("/repo/.git/gatekeeper/index.json"));
        c.index_path = Some("custom.json".into());
        assert_eq!(c.index_path_in(git_dir), PathBuf::from("/repo/.git/custom.json"));
        c.index_path = Some("/var/index.json".into());
        assert_eq!(c.index_path_in(git_dir), PathBuf::from("/var/index.json"));
    }
}
