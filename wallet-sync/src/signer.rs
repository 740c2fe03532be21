//! Transaction signing interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wallet_ledger::{Amount, Utxo};

use crate::error::Result;

/// A payment output of a transaction being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: Amount,
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txid: String,
    pub raw_hex: String,
    /// Virtual size in vbytes.
    pub vsize: usize,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign a transaction spending `inputs` to `outputs`, in that order.
    /// Every input carries its public key and derivation path.
    async fn sign(&self, inputs: &[Utxo], outputs: &[TxOutput]) -> Result<SignedTransaction>;
}
