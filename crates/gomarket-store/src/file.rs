//! # File Backend
//!
//! Stores each key as one file inside a data directory.
//!
//! ## Layout
//! ```text
//! <data_dir>/
//! └── %40GoMarketplace.json     ← key "@GoMarketplace"
//! ```
//!
//! Key bytes outside `[A-Za-z0-9_-]` are percent-encoded, so distinct keys
//! always map to distinct file names and no key can escape the directory.
//!
//! ## Write Path
//! Temp file → `sync_all` → rename over the target. A crash mid-write leaves
//! either the old record or the new one, never a torn file.

use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// Directory-backed key-value store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io("create directory", &dir, e))?;
        info!(dir = %dir.display(), "File store opened");
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn read_file(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io("read", path, e)),
    }
}

fn write_file_atomic(path: &Path, value: &str) -> StoreResult<()> {
    let temp_path = path.with_extension("json.tmp");

    let mut file = File::create(&temp_path).map_err(|e| StoreError::io("create", &temp_path, e))?;
    file.write_all(value.as_bytes())
        .map_err(|e| StoreError::io("write", &temp_path, e))?;
    file.sync_all()
        .map_err(|e| StoreError::io("sync", &temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source: e,
    })
}

fn remove_file(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io("remove", path, e)),
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || read_file(&path)).await?
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let value = value.to_string();
        debug!(path = %path.display(), bytes = value.len(), "Writing key file");
        tokio::task::spawn_blocking(move || write_file_atomic(&path, &value)).await?
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || remove_file(&path)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("@GoMarketplace"), "%40GoMarketplace");
        assert_eq!(encode_key("cart_v2-a"), "cart_v2-a");
        assert_eq!(encode_key("../etc"), "%2E%2E%2Fetc");
        assert_ne!(encode_key("@a"), encode_key("#a"));
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).unwrap();

        assert_eq!(store.get("@GoMarketplace").await.unwrap(), None);

        store.set("@GoMarketplace", "[]").await.unwrap();
        assert!(store.path_for("@GoMarketplace").exists());
        assert_eq!(
            store.get("@GoMarketplace").await.unwrap().as_deref(),
            Some("[]")
        );

        store.set("@GoMarketplace", "[1]").await.unwrap();
        assert_eq!(
            store.get("@GoMarketplace").await.unwrap().as_deref(),
            Some("[1]")
        );

        store.remove("@GoMarketplace").await.unwrap();
        store.remove("@GoMarketplace").await.unwrap();
        assert_eq!(store.get("@GoMarketplace").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("k", "value").await.unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }
}
