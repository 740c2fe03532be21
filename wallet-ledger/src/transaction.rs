//! Transaction records as returned by the indexing service.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::utxo::{SpentOutput, Utxo};

/// Height of a transaction that has not been mined yet.
pub const MEMPOOL_HEIGHT: u32 = 0;

/// Entry of an address history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoryItem {
    pub txid: String,
    pub height: u32,
}

/// A transaction with resolved inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransactionRecord {
    pub txid: String,
    /// Block height, [`MEMPOOL_HEIGHT`] while unconfirmed
    pub height: u32,
    pub fee: Amount,
    #[cfg_attr(feature = "serde", serde(rename = "in"))]
    pub inputs: Vec<SpentOutput>,
    #[cfg_attr(feature = "serde", serde(rename = "out"))]
    pub outputs: Vec<Utxo>,
    /// Unix time in milliseconds the transaction was first seen unconfirmed
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub mempool_ts: Option<u64>,
}

impl TransactionRecord {
    pub fn is_mempool(&self) -> bool {
        self.height == MEMPOOL_HEIGHT
    }
}
