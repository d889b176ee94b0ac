//! Whitelist glob grammar.
//!
//! Patterns are `/`-separated segments. Inside a segment `*` matches any run
//! of characters and `?` matches exactly one; neither crosses a `/`. A
//! segment that is exactly `**` matches zero or more whole segments.

use std::fmt;

use gk_types::{ChangeEntry, ValidationVerdict};

use crate::error::{PolicyError, PolicyResult};

/// Whitelist applied when the configuration does not provide one.
pub const DEFAULT_WHITELIST: &[&str] = &[
    "data/**/meta.yaml",
    "data/**/meta.yml",
    "data/**/*.md",
    ".gatekeeper/**",
];

/// Owned copy of [`DEFAULT_WHITELIST`], for configuration defaults.
pub fn default_whitelist() -> Vec<String> {
    DEFAULT_WHITELIST.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Recursive,
    Glob(Vec<char>),
}

/// One compiled whitelist pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern.
    ///
    /// Rejects empty patterns, absolute patterns, empty segments and `**`
    /// glued to other characters (`a**b`).
    pub fn parse(pattern: &str) -> PolicyResult<Self> {
        let invalid = |reason: &str| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern.starts_with('/') {
            return Err(invalid("pattern must be relative"));
        }

        let mut segments = Vec::new();
        for raw in pattern.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if raw == "**" {
                // Consecutive `**` segments are equivalent to one.
                if segments.last() != Some(&Segment::Recursive) {
                    segments.push(Segment::Recursive);
                }
            } else if raw.contains("**") {
                return Err(invalid("'**' must be a whole segment"));
            } else {
                segments.push(Segment::Glob(raw.chars().collect()));
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` matches this pattern.
    ///
    /// Paths with empty, `.` or `..` segments never match.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
            return false;
        }
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({})", self.source)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Recursive, rest)) => {
            match_segments(rest, path)
                || (!path.is_empty() && match_segments(pattern, &path[1..]))
        }
        Some((Segment::Glob(glob), rest)) => match path.split_first() {
            Some((head, tail)) => match_glob(glob, head) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Single-segment wildcard match with star backtracking.
fn match_glob(pattern: &[char], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Ordered whitelist: a path is permitted iff at least one pattern matches.
#[derive(Clone, Debug, Default)]
pub struct PathPolicy {
    patterns: Vec<PathPattern>,
}

impl PathPolicy {
    /// Compile every pattern, failing on the first invalid one.
    pub fn from_patterns<I, S>(patterns: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// The compiled default whitelist.
    pub fn reference() -> PolicyResult<Self> {
        Self::from_patterns(DEFAULT_WHITELIST)
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    /// Whether `path` is whitelisted. An empty policy allows nothing.
    pub fn allows(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// One `Path not allowed: <path>` line per rejected change, in order.
    pub fn violations(&self, changes: &[ChangeEntry]) -> Vec<String> {
        changes
            .iter()
            .filter(|change| !self.allows(&change.path))
            .map(|change| format!("Path not allowed: {}", change.path))
            .collect()
    }

    pub fn check(&self, changes: &[ChangeEntry]) -> ValidationVerdict {
        ValidationVerdict::from_violations(self.violations(changes))
    }
}
