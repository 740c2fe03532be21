//! Persistent per-address ledgers and transaction history.
//!
//! Three namespaces back the store:
//! - `addr`: address to [`AddressRecord`]
//! - `tx-history`: mined transactions bucketed under `i:<height>`, with
//!   unconfirmed ones kept in a separate `mempool` bucket
//! - `broadcasted`: transactions sent by this wallet, keyed by txid

use std::sync::Arc;

use wallet_ledger::{AddressRecord, MEMPOOL_HEIGHT, TransactionRecord};

use crate::error::StorageResult;
use crate::storage::KeyValueStore;
use crate::transaction_builder::SentTransaction;

const ADDRESS_NS: &str = "addr";
const HISTORY_NS: &str = "tx-history";
const SENT_NS: &str = "broadcasted";

const HISTORY_PREFIX: &str = "i:";
const MEMPOOL_KEY: &str = "mempool";

fn history_key(height: u32) -> String {
    if height == MEMPOOL_HEIGHT {
        MEMPOOL_KEY.to_string()
    } else {
        format!("{}{:010}", HISTORY_PREFIX, height)
    }
}

pub struct AddressStore {
    addresses: Arc<dyn KeyValueStore>,
    history: Arc<dyn KeyValueStore>,
    sent: Arc<dyn KeyValueStore>,
}

impl AddressStore {
    pub fn new(store: &dyn KeyValueStore) -> StorageResult<Self> {
        Ok(Self {
            addresses: store.namespace(ADDRESS_NS)?,
            history: store.namespace(HISTORY_NS)?,
            sent: store.namespace(SENT_NS)?,
        })
    }

    /// Create an empty record for `address` unless one exists.
    pub async fn new_address(&self, address: &str) -> StorageResult<()> {
        if self.addresses.get(address).await?.is_none() {
            self.addresses.put_json(address, &AddressRecord::new()).await?;
            tracing::debug!("Tracking new address {}", address);
        }
        Ok(())
    }

    pub async fn has(&self, address: &str) -> StorageResult<bool> {
        Ok(self.addresses.get(address).await?.is_some())
    }

    pub async fn get(&self, address: &str) -> StorageResult<Option<AddressRecord>> {
        self.addresses.get_json(address).await
    }

    pub async fn set(&self, address: &str, record: &AddressRecord) -> StorageResult<()> {
        self.addresses.put_json(address, record).await
    }

    /// Forget all addresses and history. The sent log is kept.
    pub async fn clear(&self) -> StorageResult<()> {
        self.addresses.clear().await?;
        self.history.clear().await
    }

    /// Transactions recorded at `height`. Height 0 reads the mempool bucket.
    pub async fn get_tx_height(&self, height: u32) -> StorageResult<Vec<TransactionRecord>> {
        Ok(self.history.get_json(&history_key(height)).await?.unwrap_or_default())
    }

    pub async fn get_mempool_txs(&self) -> StorageResult<Vec<TransactionRecord>> {
        self.get_tx_height(MEMPOOL_HEIGHT).await
    }

    /// Append transactions to their height buckets.
    ///
    /// A txid already present at its height is skipped. A mined transaction
    /// leaves the mempool bucket and keeps its first-seen timestamp.
    pub async fn store_tx_history(&self, txs: &[TransactionRecord]) -> StorageResult<()> {
        for tx in txs {
            let key = history_key(tx.height);
            let mut bucket = self.get_tx_height(tx.height).await?;
            if bucket.iter().any(|t| t.txid == tx.txid) {
                continue;
            }

            let mut record = tx.clone();
            if tx.height != MEMPOOL_HEIGHT {
                let mut mempool = self.get_mempool_txs().await?;
                if let Some(pos) = mempool.iter().position(|t| t.txid == tx.txid) {
                    let promoted = mempool.remove(pos);
                    if record.mempool_ts.is_none() {
                        record.mempool_ts = promoted.mempool_ts;
                    }
                    self.history.put_json(MEMPOOL_KEY, &mempool).await?;
                    tracing::debug!("Transaction {} left the mempool at height {}", tx.txid, tx.height);
                }
            }

            bucket.push(record);
            self.history.put_json(&key, &bucket).await?;
        }
        Ok(())
    }

    /// Visit every mined transaction in height order.
    pub async fn get_transactions<F>(&self, mut visitor: F) -> StorageResult<()>
    where
        F: FnMut(&TransactionRecord) + Send,
    {
        let buckets = self.history.scan_json::<Vec<TransactionRecord>>(HISTORY_PREFIX).await?;
        for (_, bucket) in buckets {
            for tx in &bucket {
                visitor(tx);
            }
        }
        Ok(())
    }

    pub async fn add_sent_tx(&self, tx: &SentTransaction) -> StorageResult<()> {
        self.sent.put_json(&tx.txid, tx).await
    }

    pub async fn get_sent_tx(&self, txid: &str) -> StorageResult<Option<SentTransaction>> {
        self.sent.get_json(txid).await
    }
}
