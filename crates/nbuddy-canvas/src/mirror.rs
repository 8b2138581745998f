//! Local mirror store
//!
//! The mirror is an offline copy of the user's canvases, kept as one JSON
//! array under a fixed key of a synchronous key-value store. The store is
//! injected through [`KeyValueStore`] so it can be swapped for tests or for
//! another backing medium.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::document::{Canvas, CanvasSummary};
use crate::error::{Error, Result};

/// Key under which the canvas array is stored
pub const MIRROR_KEY: &str = "notebook-buddy.canvases";

/// Key listing canvases created locally that the remote store never accepted
pub const UNSYNCED_KEY: &str = "notebook-buddy.unsynced";

/// Synchronous string key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read the value for a key, `None` if absent
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// File-backed key-value store: one `<key>.json` file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Typed view of the canvas array held in a [`KeyValueStore`]
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn KeyValueStore>,
}

impl LocalMirror {
    /// Create a mirror over the given store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Mirror backed by a fresh [`MemoryStore`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// All mirrored canvases. A missing key reads as an empty list.
    pub fn load_all(&self) -> Result<Vec<Canvas>> {
        match self.store.read(MIRROR_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the whole mirrored list
    pub fn save_all(&self, canvases: &[Canvas]) -> Result<()> {
        let raw = serde_json::to_string(canvases)?;
        self.store.write(MIRROR_KEY, &raw)?;
        debug!(count = canvases.len(), "Mirror updated");
        Ok(())
    }

    /// Get one canvas
    pub fn get(&self, canvas_id: &str) -> Result<Option<Canvas>> {
        Ok(self.load_all()?.into_iter().find(|c| c.id == canvas_id))
    }

    /// Insert a canvas or replace the one with the same id
    pub fn upsert(&self, canvas: &Canvas) -> Result<()> {
        let mut canvases = self.load_all()?;
        match canvases.iter_mut().find(|c| c.id == canvas.id) {
            Some(existing) => *existing = canvas.clone(),
            None => canvases.push(canvas.clone()),
        }
        self.save_all(&canvases)
    }

    /// Remove a canvas, returning whether it was present
    pub fn remove(&self, canvas_id: &str) -> Result<bool> {
        let mut canvases = self.load_all()?;
        let before = canvases.len();
        canvases.retain(|c| c.id != canvas_id);
        if canvases.len() == before {
            return Ok(false);
        }
        self.save_all(&canvases)?;
        Ok(true)
    }

    /// Ids of canvases that exist only in the mirror
    pub fn unsynced(&self) -> Result<Vec<String>> {
        match self.store.read(UNSYNCED_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Record that a canvas has not reached the remote store
    pub fn mark_unsynced(&self, canvas_id: &str) -> Result<()> {
        let mut ids = self.unsynced()?;
        if ids.iter().any(|id| id == canvas_id) {
            return Ok(());
        }
        ids.push(canvas_id.to_string());
        self.store.write(UNSYNCED_KEY, &serde_json::to_string(&ids)?)
    }

    /// Forget the unsynced mark of a canvas
    pub fn clear_unsynced(&self, canvas_id: &str) -> Result<()> {
        let mut ids = self.unsynced()?;
        let before = ids.len();
        ids.retain(|id| id != canvas_id);
        match (ids.is_empty(), ids.len() == before) {
            (_, true) => Ok(()),
            (true, false) => self.store.remove(UNSYNCED_KEY),
            (false, false) => self.store.write(UNSYNCED_KEY, &serde_json::to_string(&ids)?),
        }
    }

    /// Summaries of all mirrored canvases, most recently edited first
    pub fn summaries(&self) -> Result<Vec<CanvasSummary>> {
        let mut summaries: Vec<_> = self.load_all()?.iter().map(Canvas::summary).collect();
        summaries.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
        Ok(summaries)
    }
}

impl std::fmt::Debug for LocalMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMirror").field("key", &MIRROR_KEY).finish()
    }
}
