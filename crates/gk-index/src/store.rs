//! Index persistence.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{IndexError, IndexResult};
use crate::index::MetadataIndex;

/// Where the index lives between invocations.
///
/// Callers serialize invocations per repository; implementations do no
/// locking of their own.
pub trait IndexStore: Send + Sync {
    /// Load the index. A store that was never written yields an empty index.
    fn load(&self) -> IndexResult<MetadataIndex>;

    /// Replace the stored index with `index`.
    fn save(&self, index: &MetadataIndex) -> IndexResult<()>;
}

/// Index kept in a JSON file, rewritten whole on every save.
#[derive(Clone, Debug)]
pub struct JsonIndexFile {
    path: PathBuf,
}

impl JsonIndexFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> IndexError {
        IndexError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl IndexStore for JsonIndexFile {
    fn load(&self) -> IndexResult<MetadataIndex> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no index file yet");
                return Ok(MetadataIndex::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if text.trim().is_empty() {
            return Ok(MetadataIndex::new());
        }
        Ok(MetadataIndex::from_json(&text)?)
    }

    /// Written to a sibling temporary file and renamed into place, so a
    /// crash never leaves a half-written index.
    fn save(&self, index: &MetadataIndex) -> IndexResult<()> {
        let json = index.to_json()?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.write_all(b"\n"))
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        tracing::debug!(path = %self.path.display(), entries = index.len(), "index written");
        Ok(())
    }
}

/// In-memory index store. Keeps the encoded JSON so loads go through the
/// same decoding path as the file store.
pub struct InMemoryIndexStore {
    json: RwLock<Option<String>>,
    saves: RwLock<usize>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self {
            json: RwLock::new(None),
            saves: RwLock::new(0),
        }
    }

    /// The last saved document, if any.
    pub fn json(&self) -> Option<String> {
        self.json.read().expect("lock poisoned").clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        *self.saves.read().expect("lock poisoned")
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStore for InMemoryIndexStore {
    fn load(&self) -> IndexResult<MetadataIndex> {
        match self.json.read().expect("lock poisoned").as_deref() {
            Some(text) => Ok(MetadataIndex::from_json(text)?),
            None => Ok(MetadataIndex::new()),
        }
    }

    fn save(&self, index: &MetadataIndex) -> IndexResult<()> {
        let json = index.to_json()?;
        *self.json.write().expect("lock poisoned") = Some(json);
        *self.saves.write().expect("lock poisoned") += 1;
        Ok(())
    }
}

impl fmt::Debug for InMemoryIndexStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryIndexStore")
            .field("saves", &self.save_count())
            .finish()
    }
}
