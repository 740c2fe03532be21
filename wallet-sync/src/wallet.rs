//! Public wallet facade.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wallet_ledger::{Amount, BalanceSummary, Branch, SelectionResult, TransactionRecord};

use crate::config::Config;
use crate::error::{Result, WalletError};
use crate::event_bus::{self, EventBus, EventReceiver};
use crate::events::WalletEvent;
use crate::fee::{CachedFeeEstimator, FeeEstimate, FeeEstimator};
use crate::key_manager::{DerivedAddress, KeyManager};
use crate::provider::{ChainProvider, ProviderEvent};
use crate::signer::TransactionSigner;
use crate::storage::KeyValueStore;
use crate::sync_manager::{SyncManager, SyncOptions};
use crate::transaction_builder::{SendRequest, SentTransaction, TransactionBuilder};

/// A self-custodial UTXO wallet bound to one provider, key manager, signer
/// and store.
pub struct UtxoWallet<P, K, S> {
    config: Config,
    sync: Arc<SyncManager<P, K>>,
    builder: TransactionBuilder<P, K, S>,
    store: Arc<dyn KeyValueStore>,
    fee_estimator: Option<Arc<dyn FeeEstimator>>,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<P, K, S> UtxoWallet<P, K, S>
where
    P: ChainProvider + 'static,
    K: KeyManager + 'static,
    S: TransactionSigner + 'static,
{
    pub async fn new(
        config: Config,
        provider: Arc<P>,
        key_manager: Arc<K>,
        signer: Arc<S>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate().map_err(WalletError::Config)?;

        let events = EventBus::new(config.event_capacity);
        let sync =
            Arc::new(SyncManager::new(config.clone(), provider, key_manager, store.as_ref(), events).await?);
        let builder = TransactionBuilder::new(config.clone(), Arc::clone(&sync), signer);

        Ok(Self {
            config,
            sync,
            builder,
            store,
            fee_estimator: None,
            shutdown: CancellationToken::new(),
            listener: Mutex::new(None),
        })
    }

    /// Use `estimator` for [`estimate_fee`](Self::estimate_fee), caching its
    /// answers for the configured TTL.
    pub fn with_fee_estimator<E: FeeEstimator + 'static>(mut self, estimator: E) -> Self {
        self.fee_estimator = Some(Arc::new(CachedFeeEstimator::new(estimator, self.config.fee_cache_ttl)));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Restore subscriptions, read the chain tip and start listening for
    /// provider notifications.
    pub async fn init(&self) -> Result<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }

        self.sync.start_watching().await?;
        let provider_events = self.sync.provider().events();
        let height = self.sync.provider().subscribe_to_blocks().await?;
        self.sync.update_block(height).await?;

        let sync = Arc::clone(&self.sync);
        let token = self.shutdown.clone();
        *listener = Some(tokio::spawn(listen(sync, provider_events, token)));
        tracing::info!("Wallet initialized on {} at height {}", self.config.network, height);
        Ok(())
    }

    /// Stop listening and close the store.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.listener.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Provider listener ended abnormally: {}", e);
            }
        }
        self.store.close().await?;
        Ok(())
    }

    pub async fn get_new_address(&self) -> Result<DerivedAddress> {
        self.sync.new_address(Branch::External).await
    }

    pub async fn get_internal_address(&self) -> Result<DerivedAddress> {
        self.sync.new_address(Branch::Internal).await
    }

    pub async fn sync_transactions(&self, options: SyncOptions) -> Result<()> {
        self.sync.sync_account(options).await
    }

    /// Halt syncing and wait for a running pass to end.
    pub async fn pause_sync(&self) {
        let mut events = self.sync.subscribe();
        self.sync.stop_sync();
        while self.sync.is_syncing() {
            match events.recv().await {
                Ok(WalletEvent::SyncEnd) | Err(event_bus::Error::Closed) => break,
                Ok(_) | Err(event_bus::Error::Lagged(_)) => continue,
            }
        }
    }

    pub fn resume_sync(&self) {
        self.sync.resume_sync();
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    /// Balance of one address, or of the whole wallet.
    pub async fn get_balance(&self, address: Option<&str>) -> Result<BalanceSummary> {
        self.sync.get_balance(address).await
    }

    pub async fn get_transactions<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(&TransactionRecord) + Send,
    {
        self.sync.get_transactions(visitor).await
    }

    pub async fn send_transaction(&self, request: SendRequest) -> Result<SentTransaction> {
        self.builder.send(request).await
    }

    pub async fn get_sent_transaction(&self, txid: &str) -> Result<Option<SentTransaction>> {
        self.sync.get_sent_tx(txid).await
    }

    pub async fn estimate_fee(&self) -> Result<FeeEstimate> {
        match &self.fee_estimator {
            Some(estimator) => Ok(estimator.estimate().await?),
            None => Err(WalletError::Config("No fee estimator configured".to_string())),
        }
    }

    /// Lock UTXOs covering `amount`. Release them with
    /// [`unlock_utxo`](Self::unlock_utxo).
    pub async fn utxo_for_amount(&self, amount: Amount) -> Result<SelectionResult> {
        self.sync.utxo_for_amount(amount).await
    }

    pub async fn unlock_utxo(&self, success: bool) -> Result<()> {
        self.sync.unlock_utxo(success).await
    }

    pub fn subscribe(&self) -> EventReceiver<WalletEvent> {
        self.sync.subscribe()
    }
}

async fn listen<P, K>(
    sync: Arc<SyncManager<P, K>>,
    mut events: EventReceiver<ProviderEvent>,
    token: CancellationToken,
) where
    P: ChainProvider,
    K: KeyManager,
{
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(ProviderEvent::AddressChanged {
                script_hash,
                status,
            }) => {
                if let Err(e) = sync.handle_address_change(&script_hash, status).await {
                    tracing::error!("Failed to reconcile {}: {}", script_hash, e);
                }
            }
            Ok(ProviderEvent::NewBlock {
                height,
            }) => {
                if let Err(e) = sync.update_block(height).await {
                    tracing::error!("Failed to reconcile block {}: {}", height, e);
                }
            }
            Err(event_bus::Error::Lagged(n)) => {
                tracing::warn!("Missed {} provider notifications", n);
            }
            Err(event_bus::Error::Closed) => break,
        }
    }
    tracing::debug!("Provider listener stopped");
}
