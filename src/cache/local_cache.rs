//! Write-through mirror of the note collection.
//!
//! The cache has no authority of its own: it is read as a fallback seed when
//! the remote store has nothing to offer, and overwritten wholesale whenever
//! the in-memory collection changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::notes::Note;

/// Storage key used when none is configured
pub const DEFAULT_STORAGE_KEY: &str = "lumen_notes_v2";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store for the last known full note collection
pub trait NoteCache: Send {
    /// Read the cached collection. A missing or unreadable record is an
    /// empty cache, never an error.
    fn load(&self) -> Vec<Note>;

    /// Replace the cached collection
    fn store(&self, notes: &[Note]) -> Result<(), CacheError>;

    /// Remove the cached record entirely
    fn clear(&self) -> Result<(), CacheError>;
}

/// Cache kept as a single JSON file named after the storage key
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(data_dir: &Path, storage_key: &str) -> Self {
        Self {
            path: data_dir.join(format!("{}.json", storage_key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NoteCache for FileCache {
    fn load(&self) -> Vec<Note> {
        if !self.path.exists() {
            return Vec::new();
        }
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Cache: failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        parse_notes(&data)
    }

    fn store(&self, notes: &[Note]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(notes)?;
        fs::write(&self.path, data)?;
        log::debug!("Cache: wrote {} notes to {}", notes.len(), self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Cache held in memory as serialized JSON. Clones share the same record.
#[derive(Clone, Default)]
pub struct MemoryCache {
    record: Arc<Mutex<Option<String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with a raw record, which need not be valid JSON
    pub fn with_raw(raw: &str) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(raw.to_string()))),
        }
    }

    /// The raw stored record, if any
    pub fn raw(&self) -> Option<String> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl NoteCache for MemoryCache {
    fn load(&self) -> Vec<Note> {
        match self.raw() {
            Some(data) => parse_notes(&data),
            None => Vec::new(),
        }
    }

    fn store(&self, notes: &[Note]) -> Result<(), CacheError> {
        let data = serde_json::to_string(notes)?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

fn parse_notes(data: &str) -> Vec<Note> {
    match serde_json::from_str(data) {
        Ok(notes) => notes,
        Err(e) => {
            log::warn!("Cache: ignoring malformed record: {}", e);
            Vec::new()
        }
    }
}
