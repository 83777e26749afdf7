//! Cross-run credential deduplication.
//!
//! [`AlertedKeySet`] remembers every `(email, password)` pair ever selected
//! for forwarding. It is loaded once per process, owned by the pipeline, and
//! persisted as a JSON array of pairs:
//!
//! ```json
//! [["admin@example.org", "Secret123"], ["ops@example.org", "hunter2"]]
//! ```

use crate::error::StateError;
use leakscope_core::Credential;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

type Key = (String, String);

/// Set of credential keys that have already been alerted on.
///
/// Not internally synchronized; a single owner mutates it.
#[derive(Debug, Default)]
pub struct AlertedKeySet {
    keys: HashSet<Key>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl AlertedKeySet {
    /// A set that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the set from `path`.
    ///
    /// A missing file is an empty set. So is a file that cannot be read or
    /// parsed; that case is logged and the file is overwritten on the next
    /// persist.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<Key>>(&bytes) {
                Ok(pairs) => pairs.into_iter().collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "state file corrupt, starting with no history");
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, starting with no history");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, starting with no history");
                HashSet::new()
            }
        };

        info!(path = %path.display(), keys = keys.len(), "loaded alerted credential state");
        Self {
            keys,
            path: Some(path),
            dirty: false,
        }
    }

    #[must_use]
    pub fn contains(&self, credential: &Credential) -> bool {
        self.keys.contains(&credential.key())
    }

    /// Record a credential. Returns `true` if it was not already present.
    pub fn insert(&mut self, credential: &Credential) -> bool {
        let added = self.keys.insert(credential.key());
        self.dirty |= added;
        added
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether keys were added since the last load or persist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Atomically write the set to its file.
    ///
    /// The JSON is written to a temporary file in the same directory and
    /// renamed over the target, so a crash never leaves a truncated file.
    /// In-memory sets are a no-op.
    ///
    /// # Errors
    /// Returns error if the temporary file cannot be written or renamed.
    pub fn persist(&mut self) -> Result<(), StateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut pairs: Vec<&Key> = self.keys.iter().collect();
        pairs.sort();
        let json = serde_json::to_vec(&pairs)?;

        let io_err = |source| StateError::Io {
            path: path.display().to_string(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!(path = %path.display(), keys = pairs.len(), "persisted alerted credential state");
        self.dirty = false;
        Ok(())
    }
}

/// Select the credentials not yet alerted on, marking them alerted.
///
/// Duplicates within `creds` collapse to their first occurrence. Keys are
/// added before any forward is attempted, so a failed forward is not
/// retried as a new alert later.
pub fn dedupe<I>(creds: I, history: &mut AlertedKeySet) -> Vec<Credential>
where
    I: IntoIterator<Item = Credential>,
{
    creds
        .into_iter()
        .filter(|credential| history.insert(credential))
        .collect()
}
