//! In-memory storage implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::storage::KeyValueStore;

type Namespaces = HashMap<String, BTreeMap<String, Vec<u8>>>;

const ROOT: &str = "";

/// Volatile store. Namespaces created from one root share its data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    data: Arc<RwLock<Namespaces>>,
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            name: ROOT.to_string(),
            data: Arc::new(RwLock::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        let data = self.data.read().await;
        Ok(data.get(&self.name).and_then(|ns| ns.get(key)).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        let mut data = self.data.write().await;
        data.entry(self.name.clone()).or_default().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_open()?;
        let mut data = self.data.write().await;
        if let Some(ns) = data.get_mut(&self.name) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn entries(&self) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.check_open()?;
        let data = self.data.read().await;
        Ok(data
            .get(&self.name)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.check_open()?;
        self.data.write().await.remove(&self.name);
        Ok(())
    }

    fn namespace(&self, name: &str) -> StorageResult<Arc<dyn KeyValueStore>> {
        self.check_open()?;
        Ok(Arc::new(Self {
            name: name.to_string(),
            data: Arc::clone(&self.data),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
