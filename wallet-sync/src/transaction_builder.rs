//! Fee-aware transaction construction.
//!
//! A send selects UTXOs for the amount, signs a trial transaction with a
//! one-vbyte fee to learn its size, then re-signs with `rate * size` until
//! the size stops growing. Whenever the change would fall below the dust
//! limit the selection is released and redone for a larger target.
//!
//! The UTXO selection lease is always released: committed after a
//! successful broadcast, returned to the pool on any failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wallet_ledger::{Amount, Branch, Denomination, FeeRate, SelectionResult, Utxo};

use crate::config::Config;
use crate::error::{Result, ValidationError, WalletError};
use crate::key_manager::{DerivedAddress, KeyManager};
use crate::provider::ChainProvider;
use crate::signer::{SignedTransaction, TransactionSigner, TxOutput};
use crate::sync_manager::SyncManager;

/// Upper bound on sign rounds for one send.
const MAX_BUILD_ROUNDS: usize = 32;

/// A payment to build and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub address: String,
    pub amount: Amount,
    /// Fee rate in sat/vB.
    pub fee_rate: FeeRate,
}

impl SendRequest {
    /// Parse `amount` in the given denomination.
    pub fn new(
        address: impl Into<String>,
        amount: &str,
        denomination: Denomination,
        fee_rate: FeeRate,
    ) -> Result<Self> {
        Ok(Self {
            address: address.into(),
            amount: Amount::parse(amount, denomination)?,
            fee_rate,
        })
    }
}

/// A broadcast transaction, as kept in the sent log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentTransaction {
    pub send_address: String,
    pub amount: Amount,
    /// Effective rate, `total_fee / vsize`.
    pub fee_rate: FeeRate,
    pub total_fee: Amount,
    /// Amount plus fee.
    pub total_spent: Amount,
    pub vsize: usize,
    pub raw_hex: String,
    pub txid: String,
    pub utxos: Vec<Utxo>,
    pub outputs: Vec<TxOutput>,
    pub change_address: DerivedAddress,
}

struct Built {
    signed: SignedTransaction,
    selection: SelectionResult,
    outputs: Vec<TxOutput>,
    fee: Amount,
}

pub struct TransactionBuilder<P, K, S> {
    config: Config,
    sync: Arc<SyncManager<P, K>>,
    signer: Arc<S>,
}

impl<P, K, S> TransactionBuilder<P, K, S>
where
    P: ChainProvider,
    K: KeyManager,
    S: TransactionSigner,
{
    pub fn new(config: Config, sync: Arc<SyncManager<P, K>>, signer: Arc<S>) -> Self {
        Self {
            config,
            sync,
            signer,
        }
    }

    fn validate(&self, request: &SendRequest) -> Result<()> {
        if request.fee_rate.is_zero() || request.fee_rate > self.config.max_fee_rate {
            return Err(ValidationError::InvalidFee(request.fee_rate).into());
        }
        if request.amount <= self.config.dust_limit {
            return Err(WalletError::DustLimit {
                amount: request.amount,
                limit: self.config.dust_limit,
            });
        }
        Ok(())
    }

    /// Build, sign and broadcast a payment.
    pub async fn send(&self, request: SendRequest) -> Result<SentTransaction> {
        self.validate(&request)?;

        let change = self.sync.new_address(Branch::Internal).await?;
        let selection = self.sync.utxo_for_amount(request.amount).await?;

        let built = match self.build(&request, &change, selection).await {
            Ok(built) => built,
            Err(e) => {
                // A competing lease is not ours to release.
                if !matches!(e, WalletError::Concurrency(_)) {
                    self.sync.unlock_utxo(false).await?;
                }
                return Err(e);
            }
        };

        let Built {
            signed,
            selection,
            outputs,
            fee,
        } = built;

        let txid = match self.sync.provider().broadcast_transaction(&signed.raw_hex).await {
            Ok(txid) => txid,
            Err(e) => {
                tracing::warn!("Broadcast of {} failed: {}", signed.txid, e);
                self.sync.unlock_utxo(false).await?;
                return Err(e.into());
            }
        };
        self.sync.unlock_utxo(true).await?;

        let vsize = signed.vsize.max(1) as u64;
        let sent = SentTransaction {
            send_address: request.address,
            amount: request.amount,
            fee_rate: FeeRate::new(fee.to_sat().unsigned_abs() / vsize),
            total_fee: fee,
            total_spent: request.amount + fee,
            vsize: signed.vsize,
            raw_hex: signed.raw_hex,
            txid,
            utxos: selection.selected,
            outputs,
            change_address: change,
        };
        self.sync.add_sent_tx(&sent).await?;
        self.sync.watch_tx_mempool(&sent.txid).await;

        tracing::info!(
            "Broadcast {} paying {} with fee {} ({} vB)",
            sent.txid,
            sent.amount,
            sent.total_fee,
            sent.vsize
        );
        Ok(sent)
    }

    async fn build(
        &self,
        request: &SendRequest,
        change: &DerivedAddress,
        mut selection: SelectionResult,
    ) -> Result<Built> {
        // The first round signs with a one-vbyte fee only to learn the size.
        let mut trial = true;
        let mut weight: usize = 1;

        for _ in 0..MAX_BUILD_ROUNDS {
            let fee = request.fee_rate.calculate_fee(weight);
            let change_value = selection.total - request.amount - fee;

            if change_value < self.config.dust_limit {
                let target = selection.total + fee;
                tracing::debug!(
                    "Change {} below dust limit with fee {}, reselecting for {}",
                    change_value,
                    fee,
                    target
                );
                self.sync.unlock_utxo(false).await?;
                selection = self.sync.utxo_for_amount(target).await?;
                continue;
            }

            let outputs = vec![
                TxOutput {
                    address: request.address.clone(),
                    value: request.amount,
                },
                TxOutput {
                    address: change.address.clone(),
                    value: change_value,
                },
            ];
            let signed = self.signer.sign(&selection.selected, &outputs).await?;

            if !trial && signed.vsize <= weight {
                return Ok(Built {
                    signed,
                    selection,
                    outputs,
                    fee,
                });
            }
            trial = false;
            weight = signed.vsize;
        }

        Err(WalletError::Signing(format!("Fee did not converge after {} rounds", MAX_BUILD_ROUNDS)))
    }
}
