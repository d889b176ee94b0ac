use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A revision identifier understood by the backing store.
///
/// Usually a full commit hash, but any revision expression the store accepts
/// (`HEAD`, a tree id from `git write-tree`, a branch name) is valid. A
/// revision made entirely of `0` characters is the null sentinel git uses for
/// "no previous revision" (new branch) or "no new revision" (deleted branch).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Parse a revision, trimming surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidRevision(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The SHA-1 null sentinel (40 zeros).
    pub fn null() -> Self {
        Self("0".repeat(40))
    }

    /// Returns `true` if this is the all-zero sentinel.
    pub fn is_null(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }

    /// The revision as passed to the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 characters) for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.short())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Revision {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A ref as reported by a push (`refs/heads/main`) or a bare branch name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefName(String);

impl RefName {
    /// Parse a ref name. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyRef);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The full ref as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Branch name: the ref with any `refs/heads/` prefix stripped.
    pub fn branch(&self) -> &str {
        self.0.strip_prefix("refs/heads/").unwrap_or(&self.0)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_is_detected() {
        assert!(Revision::null().is_null());
        assert!(Revision::parse(&"0".repeat(64)).unwrap().is_null());
        assert!(!Revision::parse("HEAD").unwrap().is_null());
        assert!(!Revision::parse("0a00").unwrap().is_null());
    }

    #[test]
    fn parse_trims_and_rejects_blank() {
        assert_eq!(Revision::parse("  abc123\n").unwrap().as_str(), "abc123");
        assert!(Revision::parse("   ").is_err());
        assert!(Revision::parse("a b").is_err());
    }

    #[test]
    fn short_form_is_at_most_eight_chars() {
        let rev = Revision::parse("0123456789abcdef").unwrap();
        assert_eq!(rev.short(), "01234567");
        assert_eq!(Revision::parse("HEAD").unwrap().short(), "HEAD");
    }

    #[test]
    fn branch_strips_heads_prefix() {
        assert_eq!(RefName::parse("refs/heads/main").unwrap().branch(), "main");
        assert_eq!(
            RefName::parse("refs/heads/feature/x").unwrap().branch(),
            "feature/x"
        );
        assert_eq!(RefName::parse("main").unwrap().branch(), "main");
        assert_eq!(RefName::parse("refs/tags/v1").unwrap().branch(), "refs/tags/v1");
        assert_eq!(RefName::parse("").unwrap_err(), TypeError::EmptyRef);
    }

    #[test]
    fn serde_is_transparent() {
        let rev = Revision::parse("deadbeef").unwrap();
        assert_eq!(serde_json::to_string(&rev).unwrap(), "\"deadbeef\"");
    }
}
