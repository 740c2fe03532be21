use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use wallet_ledger::Utxo;

use crate::error::{Result, WalletError};
use crate::signer::{SignedTransaction, TransactionSigner, TxOutput};

/// Signer producing fake transactions with a P2WPKH-like size.
///
/// Every signature gets a fresh txid, and the raw hex is the hex encoding of
/// that txid so [`MockProvider`](super::MockProvider) can read it back.
#[derive(Debug, Default)]
pub struct MockSigner {
    signed: AtomicU64,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vsize(inputs: usize, outputs: usize) -> usize {
        11 + 68 * inputs + 31 * outputs
    }

    /// Number of transactions signed so far.
    pub fn sign_calls(&self) -> u64 {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign(&self, inputs: &[Utxo], outputs: &[TxOutput]) -> Result<SignedTransaction> {
        if let Some(utxo) = inputs.iter().find(|u| !u.is_signable()) {
            return Err(WalletError::Signing(format!("Missing key for {}", utxo.point_id())));
        }
        let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
        let txid = format!("{:064x}", n);
        Ok(SignedTransaction {
            raw_hex: hex::encode(&txid),
            txid,
            vsize: Self::vsize(inputs.len(), outputs.len()),
        })
    }
}
