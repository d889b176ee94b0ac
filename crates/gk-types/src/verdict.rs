use serde::{Deserialize, Serialize};

/// Message used when a failure carries no explanation of its own.
pub const DEFAULT_FAILURE_MESSAGE: &str = "validation failed";

/// Outcome of one validation run.
///
/// A failed verdict always carries a non-empty message with one line per
/// violation, so operators see every problem at once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationVerdict {
    /// An accepting verdict with no message.
    pub fn pass() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    /// A failing verdict. A blank message is replaced by a default.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            ok: false,
            message: Some(message),
        }
    }

    /// Build a verdict from a list of violations: empty means pass.
    pub fn from_violations<I, S>(violations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = violations.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            Self::pass()
        } else {
            Self::fail(lines.join("\n"))
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Individual violation lines (empty for a passing verdict).
    pub fn violations(&self) -> Vec<&str> {
        match (&self.message, self.ok) {
            (Some(msg), false) => msg.lines().collect(),
            _ => Vec::new(),
        }
    }

    /// Merge two verdicts: passes only if both pass; messages are joined.
    pub fn merge(self, other: ValidationVerdict) -> ValidationVerdict {
        let mut lines: Vec<String> = Vec::new();
        for verdict in [&self, &other] {
            if !verdict.ok {
                lines.extend(verdict.violations().into_iter().map(str::to_string));
            }
        }
        if self.ok && other.ok {
            Self::pass()
        } else {
            Self::from_violations(lines)
        }
    }
}

impl Default for ValidationVerdict {
    fn default() -> Self {
        Self::pass()
    }
}
