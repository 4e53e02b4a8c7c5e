//! Persistent key-value storage.
//!
//! The calibration store and the device persist everything through the
//! narrow [`KeyValueStore`] interface: opaque byte blobs for matrices and
//! scalars for everything else. Missing keys are never an error; readers
//! supply a default.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`] - a `HashMap`, for tests and volatile sessions
//! - [`FileStore`] - a YAML document on disk, rewritten on every change
//!
//! # Example
//!
//! ```rust
//! use chroma_calib::{KeyValueStore, MemoryStore};
//!
//! let mut kv = MemoryStore::new();
//! kv.put_bool("dual_mode", true).unwrap();
//! assert!(kv.get_bool("dual_mode", false));
//! assert_eq!(kv.get_u64("missing", 7), 7);
//! ```

use crate::error::CalibResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredValue {
    /// Opaque blob.
    Bytes(Vec<u8>),
    /// Flag.
    Bool(bool),
    /// Unsigned integer.
    UInt(u64),
    /// Float.
    Float(f32),
    /// Text.
    Text(String),
}

/// Key-value persistence backend.
///
/// Only [`get`](Self::get), [`put`](Self::put) and [`remove`](Self::remove)
/// are required; the typed accessors return the caller's default for a
/// missing key or a value of another type.
pub trait KeyValueStore {
    /// Raw lookup.
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Stores a value, replacing any previous one.
    fn put(&mut self, key: &str, value: StoredValue) -> CalibResult<()>;

    /// Removes a key. Returns `true` if it existed.
    fn remove(&mut self, key: &str) -> CalibResult<bool>;

    /// Returns `true` if the key exists.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Reads a blob.
    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.get(key) {
            Some(StoredValue::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    /// Writes a blob.
    fn put_bytes(&mut self, key: &str, bytes: &[u8]) -> CalibResult<()> {
        self.put(key, StoredValue::Bytes(bytes.to_vec()))
    }

    /// Reads a flag.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(StoredValue::Bool(v)) => v,
            _ => default,
        }
    }

    /// Writes a flag.
    fn put_bool(&mut self, key: &str, value: bool) -> CalibResult<()> {
        self.put(key, StoredValue::Bool(value))
    }

    /// Reads an unsigned integer.
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(StoredValue::UInt(v)) => v,
            _ => default,
        }
    }

    /// Writes an unsigned integer.
    fn put_u64(&mut self, key: &str, value: u64) -> CalibResult<()> {
        self.put(key, StoredValue::UInt(value))
    }

    /// Reads a float.
    fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(StoredValue::Float(v)) => v,
            _ => default,
        }
    }

    /// Writes a float.
    fn put_f32(&mut self, key: &str, value: f32) -> CalibResult<()> {
        self.put(key, StoredValue::Float(value))
    }

    /// Reads text.
    fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(StoredValue::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Writes text.
    fn put_text(&mut self, key: &str, value: &str) -> CalibResult<()> {
        self.put(key, StoredValue::Text(value.to_string()))
    }
}

/// Volatile in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: StoredValue) -> CalibResult<()> {
        trace!(key, "memory store put");
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CalibResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// YAML-file backed store.
///
/// The whole document is loaded on [`open`](Self::open) and written back
/// after every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, StoredValue>,
}

impl FileStore {
    /// Opens a store, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> CalibResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_yaml::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "opened calibration store");
        Ok(Self { path, entries })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&self) -> CalibResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let text = serde_yaml::to_string(&self.entries)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: StoredValue) -> CalibResult<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> CalibResult<bool> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_defaults() {
        let mut kv = MemoryStore::new();
        kv.put_u64("count", 5).unwrap();
        assert_eq!(kv.get_u64("count", 0), 5);
        // Wrong type falls back to the default.
        assert!(!kv.get_bool("count", false));
        assert_eq!(kv.get_f32("count", 1.5), 1.5);
        assert!(kv.get_bytes("nothing").is_none());
        assert!(kv.remove("count").unwrap());
        assert!(!kv.remove("count").unwrap());
        assert!(kv.is_empty());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal").join("store.yaml");

        {
            let mut kv = FileStore::open(&path).unwrap();
            assert!(kv.is_empty());
            kv.put_bytes("blob", &[0, 1, 254, 255]).unwrap();
            kv.put_f32("gain", 0.962_f32).unwrap();
            kv.put_text("kind", "display_rgb").unwrap();
        }

        let kv = FileStore::open(&path).unwrap();
        assert_eq!(kv.len(), 3);
        assert_eq!(kv.get_bytes("blob").unwrap(), vec![0, 1, 254, 255]);
        assert_eq!(kv.get_f32("gain", 0.0), 0.962_f32);
        assert_eq!(kv.get_text("kind").as_deref(), Some("display_rgb"));
    }

    #[test]
    fn test_file_store_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "key: [unclosed").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert!(err.is_storage_error());
    }
}
