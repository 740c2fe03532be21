//! Wallet-wide ledger summed over every tracked address.

use wallet_ledger::{AddressRecord, Amount, BalanceSummary, Direction, TxState};

use crate::error::StorageResult;
use crate::state::StateDb;

pub struct TotalBalance {
    state: StateDb,
    record: AddressRecord,
}

impl TotalBalance {
    /// Load the persisted total.
    pub async fn load(state: StateDb) -> StorageResult<Self> {
        let record = state.total_balance().await?;
        Ok(Self {
            state,
            record,
        })
    }

    /// Record a received output or spent input. Returns whether the total
    /// changed.
    pub fn add(&mut self, direction: Direction, state: TxState, point_id: &str, amount: Amount) -> bool {
        self.record.entry_mut(direction).add_point(state, point_id, amount)
    }

    pub fn add_fee(&mut self, state: TxState, txid: &str, amount: Amount) -> bool {
        self.record.fee.add_point(state, txid, amount)
    }

    /// Received minus spent, per state.
    pub fn spendable(&self) -> BalanceSummary {
        self.record.net()
    }

    pub fn record(&self) -> &AddressRecord {
        &self.record
    }

    pub async fn save(&self) -> StorageResult<()> {
        self.state.set_total_balance(&self.record).await
    }

    pub async fn reset(&mut self) -> StorageResult<()> {
        self.record = AddressRecord::new();
        self.save().await
    }
}
