//! Key-value persistence for wallet state.
//!
//! Every component of the wallet owns one namespace of a [`KeyValueStore`].
//! Values are JSON documents; keys are arbitrary UTF-8 strings and iterate
//! in lexicographic order, which the history index relies on.

pub mod disk;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageResult;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Namespaced byte store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// All entries, sorted by key.
    async fn entries(&self) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Remove every entry of this namespace.
    async fn clear(&self) -> StorageResult<()>;

    /// A sibling namespace backed by the same store.
    fn namespace(&self, name: &str) -> StorageResult<Arc<dyn KeyValueStore>>;

    /// Flush and release resources. Later calls fail with `Closed`.
    async fn close(&self) -> StorageResult<()>;
}

impl<'a> dyn KeyValueStore + 'a {
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put_json<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let encoded = serde_json::to_vec(value)?;
        self.put(key, &encoded).await
    }

    /// Decoded entries whose key starts with `prefix`, in key order.
    pub async fn scan_json<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> StorageResult<Vec<(String, T)>> {
        let mut values = Vec::new();
        for (key, bytes) in self.entries().await? {
            if key.starts_with(prefix) {
                values.push((key, serde_json::from_slice(&bytes)?));
            }
        }
        Ok(values)
    }
}
