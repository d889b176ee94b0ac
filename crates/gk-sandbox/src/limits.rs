use std::time::Duration;

/// Default wall-clock budget for one policy run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Resource bounds applied to every policy run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Wall-clock deadline, measured from the start of compilation.
    pub timeout: Duration,
    pub max_call_levels: usize,
    /// Maximum expression nesting (global, inside functions).
    pub max_expr_depth: (usize, usize),
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    /// File names the `is_metadata_path` helper recognizes.
    pub metadata_filenames: Vec<String>,
}

impl SandboxLimits {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metadata_filenames(mut self, names: Vec<String>) -> Self {
        self.metadata_filenames = names;
        self
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_call_levels: 64,
            max_expr_depth: (64, 32),
            max_string_size: 4 * 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 10_000,
            metadata_filenames: gk_policy::DEFAULT_METADATA_FILENAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
