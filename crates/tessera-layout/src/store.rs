#![forbid(unsafe_code)]

//! Persistence gateway for the canonical item list.
//!
//! The engine talks to storage only through [`LayoutStore`]. Two
//! implementations ship with the crate:
//!
//! - [`MemoryStore`]: a shared key/value map of JSON blobs. Clones share the
//!   same map, so a test can hand one clone to the engine and inspect the
//!   other.
//! - [`FileStore`]: one JSON document per key under a directory.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "items": [
//!     { "id": "clock-1", "x": 0, "y": 0, "w": 3, "h": 2, "type": "clock" }
//!   ]
//! }
//! ```
//!
//! # Atomic Writes
//!
//! [`FileStore`] writes to `<key>.json.tmp` and renames it over
//! `<key>.json`, so a crash mid-write leaves the previous document intact.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::item::GridItem;

/// Current persisted document version.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Errors raised by a [`LayoutStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error for layout `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse layout `{key}`: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize layout `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported layout version {found} for `{key}` (expected {expected})")]
    UnsupportedVersion { key: String, found: u32, expected: u32 },
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// Versioned on-disk / in-memory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLayout {
    pub version: u32,
    pub items: Vec<GridItem>,
}

impl StoredLayout {
    /// Wrap `items` at the current version.
    #[must_use]
    pub fn new(items: Vec<GridItem>) -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            items,
        }
    }

    fn encode(items: &[GridItem], key: &str) -> Result<String, StoreError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            version: u32,
            items: &'a [GridItem],
        }
        serde_json::to_string_pretty(&Borrowed {
            version: STORE_FORMAT_VERSION,
            items,
        })
        .map_err(|source| StoreError::Serialize {
            key: key.to_owned(),
            source,
        })
    }

    fn decode(text: &str, key: &str) -> Result<Vec<GridItem>, StoreError> {
        let doc: Self = serde_json::from_str(text).map_err(|source| StoreError::Parse {
            key: key.to_owned(),
            source,
        })?;
        if doc.version != STORE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                key: key.to_owned(),
                found: doc.version,
                expected: STORE_FORMAT_VERSION,
            });
        }
        Ok(doc.items)
    }
}

/// Load/save access to persisted item lists.
pub trait LayoutStore {
    /// Read the list stored under `key`. `Ok(None)` means nothing is stored.
    fn load(&self, key: &str) -> Result<Option<Vec<GridItem>>, StoreError>;

    /// Replace the list stored under `key`.
    fn save(&mut self, key: &str, items: &[GridItem]) -> Result<(), StoreError>;
}

/// In-memory store of JSON blobs, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw blob, bypassing serialization (e.g. to plant corrupt data).
    pub fn insert_raw(&self, key: impl Into<String>, blob: impl Into<String>) {
        self.lock().insert(key.into(), blob.into());
    }

    /// Raw blob stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LayoutStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<GridItem>>, StoreError> {
        match self.raw(key) {
            Some(text) => StoredLayout::decode(&text, key).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: &str, items: &[GridItem]) -> Result<(), StoreError> {
        let text = StoredLayout::encode(items, key)?;
        self.lock().insert(key.to_owned(), text);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` document per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store documents under `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names: ASCII alphanumerics plus `_ . -`, no leading dot.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}

impl LayoutStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<GridItem>>, StoreError> {
        let path = self.path_for(key)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_owned(),
                    source,
                });
            }
        };
        StoredLayout::decode(&text, key).map(Some)
    }

    fn save(&mut self, key: &str, items: &[GridItem]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let text = StoredLayout::encode(items, key)?;
        let io_err = |source: io::Error| StoreError::Io {
            key: key.to_owned(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, text).map_err(io_err)?;
        fs::rename(&temp, &path).map_err(io_err)?;
        Ok(())
    }
}
