//! Small wallet-wide values: chain tip, watch lists and the total ledger.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wallet_ledger::{AddressRecord, Branch};

use crate::error::StorageResult;
use crate::storage::KeyValueStore;

const STATE_NS: &str = "state";
const LATEST_BLOCK_KEY: &str = "latest_block";
const TOTAL_BALANCE_KEY: &str = "total_balance";

fn watch_key(branch: Branch) -> String {
    format!("watched_script_hashes_{}", branch.as_str())
}

/// A subscribed script hash and the last status the provider reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedScript {
    pub script_hash: String,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct StateDb {
    store: Arc<dyn KeyValueStore>,
}

impl StateDb {
    pub fn new(store: &dyn KeyValueStore) -> StorageResult<Self> {
        Ok(Self {
            store: store.namespace(STATE_NS)?,
        })
    }

    pub async fn latest_block(&self) -> StorageResult<u32> {
        Ok(self.store.get_json(LATEST_BLOCK_KEY).await?.unwrap_or(0))
    }

    pub async fn set_latest_block(&self, height: u32) -> StorageResult<()> {
        self.store.put_json(LATEST_BLOCK_KEY, &height).await
    }

    pub async fn watched_scripts(&self, branch: Branch) -> StorageResult<Vec<WatchedScript>> {
        Ok(self.store.get_json(&watch_key(branch)).await?.unwrap_or_default())
    }

    pub async fn set_watched_scripts(
        &self,
        branch: Branch,
        scripts: &[WatchedScript],
    ) -> StorageResult<()> {
        self.store.put_json(&watch_key(branch), scripts).await
    }

    pub async fn total_balance(&self) -> StorageResult<AddressRecord> {
        Ok(self.store.get_json(TOTAL_BALANCE_KEY).await?.unwrap_or_default())
    }

    pub async fn set_total_balance(&self, record: &AddressRecord) -> StorageResult<()> {
        self.store.put_json(TOTAL_BALANCE_KEY, record).await
    }
}
