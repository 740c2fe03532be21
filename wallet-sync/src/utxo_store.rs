//! [`UtxoSet`] persisted entry by entry.
//!
//! Outputs live under `vout:<point>`, observed spends under `vin:<point>`
//! and outputs spent by our own broadcasts under `spent:<point>`. Locks are
//! never persisted: a restart releases any selection in flight.

use std::sync::Arc;

use wallet_ledger::{
    Amount, OutPoint, SelectionError, SelectionResult, SpentOutput, Utxo, UtxoSet,
};

use crate::error::StorageResult;
use crate::storage::KeyValueStore;

const UTXO_NS: &str = "utxo";
const VOUT_PREFIX: &str = "vout:";
const VIN_PREFIX: &str = "vin:";
const SPENT_PREFIX: &str = "spent:";

pub struct UtxoStore {
    store: Arc<dyn KeyValueStore>,
    set: UtxoSet,
}

impl UtxoStore {
    pub async fn load(store: &dyn KeyValueStore) -> StorageResult<Self> {
        let store = store.namespace(UTXO_NS)?;
        let vout: Vec<Utxo> =
            store.scan_json::<Utxo>(VOUT_PREFIX).await?.into_iter().map(|(_, u)| u).collect();
        let vin: Vec<SpentOutput> =
            store.scan_json::<SpentOutput>(VIN_PREFIX).await?.into_iter().map(|(_, s)| s).collect();
        let committed: Vec<OutPoint> =
            store.scan_json::<OutPoint>(SPENT_PREFIX).await?.into_iter().map(|(_, o)| o).collect();

        tracing::debug!(
            "Loaded UTXO store: {} outputs, {} spends, {} committed",
            vout.len(),
            vin.len(),
            committed.len()
        );

        let mut set = UtxoSet::from_parts(vin, vout, committed);
        set.process();
        Ok(Self {
            store,
            set,
        })
    }

    pub fn set(&self) -> &UtxoSet {
        &self.set
    }

    /// Record an output, keeping the stored copy in step with the set.
    pub async fn add_output(&mut self, utxo: Utxo) -> StorageResult<bool> {
        let outpoint = utxo.outpoint();
        let added = self.set.add_output(utxo);
        if let Some(current) = self.set.get(&outpoint) {
            self.store.put_json(&format!("{}{}", VOUT_PREFIX, outpoint), current).await?;
        }
        Ok(added)
    }

    pub async fn add_input(&mut self, spent: SpentOutput) -> StorageResult<bool> {
        let key = format!("{}{}", VIN_PREFIX, spent.spends());
        if !self.set.add_input(spent.clone()) {
            return Ok(false);
        }
        self.store.put_json(&key, &spent).await?;
        Ok(true)
    }

    pub fn process(&mut self) {
        self.set.process();
    }

    pub fn select(&mut self, target: Amount) -> Result<SelectionResult, SelectionError> {
        self.set.get_utxo_for_amount(target)
    }

    /// Release the selection lease. With `success` the locked outputs are
    /// recorded as spent.
    pub async fn unlock(&mut self, success: bool) -> StorageResult<()> {
        let locked: Vec<OutPoint> = self.set.locked().cloned().collect();
        self.set.unlock(success);
        if success {
            for outpoint in locked {
                self.store.delete(&format!("{}{}", VOUT_PREFIX, outpoint)).await?;
                self.store.put_json(&format!("{}{}", SPENT_PREFIX, outpoint), &outpoint).await?;
            }
        }
        Ok(())
    }

    pub async fn clear(&mut self) -> StorageResult<()> {
        self.set.clear();
        self.store.clear().await
    }
}
