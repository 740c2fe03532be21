//! File-backed storage.
//!
//! Each namespace is a directory under the base path and each entry a file
//! named after the hex encoding of its key, so arbitrary keys map to safe
//! file names. Writes go to a temporary file that is renamed into place.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};
use crate::storage::KeyValueStore;

const ROOT_DIR: &str = "_root";
const ENTRY_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Persistent store rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    base_path: PathBuf,
    dir: PathBuf,
    closed: Arc<AtomicBool>,
}

impl DiskStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        let dir = base_path.join(ROOT_DIR);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
        Ok(Self {
            base_path,
            dir,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", hex::encode(key), ENTRY_EXT))
    }
}

async fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension(TMP_EXT);
    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp_path, path).await
}

fn decode_key(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(&format!(".{}", ENTRY_EXT))?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl KeyValueStore for DiskStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        match fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        atomic_write(&self.entry_path(key), value)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to write {}: {}", key, e)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_open()?;
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed(format!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn entries(&self) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.check_open()?;
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // Leftover temporaries from an interrupted write are skipped.
            let Some(key) = decode_key(name) else {
                continue;
            };
            let bytes = fs::read(entry.path()).await?;
            entries.push((key, bytes));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn clear(&self) -> StorageResult<()> {
        self.check_open()?;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::WriteFailed(format!("Failed to clear: {}", e))),
        }
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn namespace(&self, name: &str) -> StorageResult<Arc<dyn KeyValueStore>> {
        self.check_open()?;
        let dir = self.base_path.join(hex::encode(name));
        std::fs::create_dir_all(&dir).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create namespace {}: {}", name, e))
        })?;
        Ok(Arc::new(Self {
            base_path: self.base_path.clone(),
            dir,
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path()).await.unwrap();
        let ns = store.namespace("addr").unwrap();

        ns.put("bc1q/with:odd chars", b"value").await.unwrap();
        assert_eq!(ns.get("bc1q/with:odd chars").await.unwrap(), Some(b"value".to_vec()));

        ns.delete("bc1q/with:odd chars").await.unwrap();
        ns.delete("bc1q/with:odd chars").await.unwrap();
        assert_eq!(ns.get("bc1q/with:odd chars").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_sorted_by_key() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path()).await.unwrap();
        let ns = store.namespace("tx-history").unwrap();
        ns.put("i:0000000200", b"b").await.unwrap();
        ns.put("i:0000000000", b"m").await.unwrap();
        ns.put("i:0000000100", b"a").await.unwrap();
        tokio::fs::write(ns_dir(&tmp, "tx-history").join("junk.tmp"), b"x").await.unwrap();

        let keys: Vec<String> = ns.entries().await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["i:0000000000", "i:0000000100", "i:0000000200"]);
    }

    fn ns_dir(tmp: &TempDir, name: &str) -> PathBuf {
        tmp.path().join(hex::encode(name))
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = TempDir::new().unwrap();
        {
            let store = DiskStore::new(tmp.path()).await.unwrap();
            let ns: Arc<dyn KeyValueStore> = store.namespace("state").unwrap();
            ns.put_json("latest_block", &812_000u32).await.unwrap();
            store.close().await.unwrap();
            assert!(matches!(ns.get("latest_block").await, Err(StorageError::Closed)));
        }
        let store = DiskStore::new(tmp.path()).await.unwrap();
        let ns: Arc<dyn KeyValueStore> = store.namespace("state").unwrap();
        assert_eq!(ns.get_json::<u32>("latest_block").await.unwrap(), Some(812_000));
    }

    #[tokio::test]
    async fn test_clear_namespace_only() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path()).await.unwrap();
        let a = store.namespace("a").unwrap();
        let b = store.namespace("b").unwrap();
        a.put("k", b"1").await.unwrap();
        b.put("k", b"2").await.unwrap();

        a.clear().await.unwrap();
        assert!(a.entries().await.unwrap().is_empty());
        assert_eq!(b.get("k").await.unwrap(), Some(b"2".to_vec()));
    }
}
