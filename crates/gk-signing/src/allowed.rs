use std::fmt;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::SigningResult;

/// Key type prefixes that mark a bare public key line.
const BARE_KEY_PREFIXES: &[&str] = &["ssh-", "ecdsa-", "sk-"];

/// Turn one key-file line into an allowed-signers entry.
///
/// Blank lines and comments yield `None`. A bare public key (as found in a
/// `.pub` file) gets the `*` principal so it matches any signer identity;
/// lines that already name principals pass through unchanged.
pub fn allowed_signers_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if BARE_KEY_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
        Some(format!("* {line}"))
    } else {
        Some(line.to_string())
    }
}

/// A temporary allowed-signers file. Removed from disk when dropped.
pub struct AllowedSigners {
    file: NamedTempFile,
    entries: usize,
}

impl AllowedSigners {
    /// Concatenate key files into a fresh temporary file.
    ///
    /// Returns `None` when the files hold no usable entry; nothing is
    /// written to disk in that case.
    pub fn from_key_files<I, C>(files: I) -> SigningResult<Option<Self>>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let lines: Vec<String> = files
            .into_iter()
            .flat_map(|bytes| {
                String::from_utf8_lossy(bytes.as_ref())
                    .lines()
                    .filter_map(allowed_signers_line)
                    .collect::<Vec<_>>()
            })
            .collect();
        if lines.is_empty() {
            return Ok(None);
        }

        let mut file = tempfile::Builder::new()
            .prefix("gatekeeper-allowed-signers-")
            .tempfile()?;
        for line in &lines {
            writeln!(file, "{line}")?;
        }
        file.flush()?;

        Ok(Some(Self {
            file,
            entries: lines.len(),
        }))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of entries written.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

impl fmt::Debug for AllowedSigners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowedSigners")
            .field("path", &self.path())
            .field("entries", &self.entries)
            .finish()
    }
}
