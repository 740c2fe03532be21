//! Sync orchestration.
//!
//! [`SyncManager`] owns the wallet's mutable state (address ledgers, total
//! balance, UTXO set, HD scan state, watch list and chain tip) and keeps it
//! in step with the provider three ways:
//!
//! - a full account pass walking both branches up to the gap limit
//! - address status notifications for watched script hashes
//! - new block notifications, which re-read recent and mempool history so
//!   balances move from mempool to pending to confirmed
//!
//! A `halted` flag is checked between paths and before each reconciliation.
//! Only one account pass runs at a time.

use std::cmp;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use wallet_ledger::{
    Amount, BalanceSummary, Branch, Direction, GapLimit, HdPath, IngestPlan, LedgerUpdate, PathScanner,
    SelectionResult, TransactionRecord, plan_ingestion,
};

use crate::address_store::AddressStore;
use crate::address_watch::AddressWatch;
use crate::block_counter::{BlockChange, BlockCounter, BlockUpdate};
use crate::config::Config;
use crate::error::{ConcurrencyError, Result, StorageResult, ValidationError};
use crate::event_bus::{EventBus, EventReceiver};
use crate::events::WalletEvent;
use crate::hd_wallet::HdWallet;
use crate::key_manager::{DerivedAddress, KeyManager};
use crate::provider::{ChainProvider, RequestOptions};
use crate::state::StateDb;
use crate::storage::KeyValueStore;
use crate::total_balance::TotalBalance;
use crate::transaction_builder::SentTransaction;
use crate::utxo_store::UtxoStore;

/// Options for a full account pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Forget all history and scan progress first.
    pub restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathOutcome {
    Empty,
    HasTx,
    Halted,
}

/// Clears the syncing flag however the pass ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Ledger {
    addresses: AddressStore,
    total: TotalBalance,
    unspent: UtxoStore,
}

impl Ledger {
    /// Apply one planned transaction to the address ledgers, the total and
    /// the UTXO set.
    async fn apply(&mut self, plan: &IngestPlan, known: &HashMap<String, DerivedAddress>) -> StorageResult<()> {
        for update in &plan.updates {
            let address = update.address();
            let id = update.point_id();
            let amount = update.amount();
            let mut record = self.addresses.get(address).await?.unwrap_or_default();

            let changed = match update {
                LedgerUpdate::Received(utxo) => {
                    let mut utxo = utxo.clone();
                    if let Some(derived) = known.get(address) {
                        utxo.address_public_key = Some(derived.public_key.clone());
                        utxo.address_path = Some(derived.path.clone());
                    }
                    self.unspent.add_output(utxo).await?;
                    self.total.add(Direction::Out, plan.state, &id, amount);
                    record.outputs.add_point(plan.state, &id, amount)
                }
                LedgerUpdate::Spent(spent) => {
                    self.unspent.add_input(spent.clone()).await?;
                    self.total.add(Direction::In, plan.state, &id, amount);
                    record.inputs.add_point(plan.state, &id, amount)
                }
                LedgerUpdate::Fee {
                    ..
                } => {
                    self.total.add_fee(plan.state, &id, amount);
                    record.fee.add_point(plan.state, &id, amount)
                }
            };

            if changed {
                tracing::debug!("{} {} {} as {}", address, id, amount, plan.state);
                self.addresses.set(address, &record).await?;
            }
        }
        Ok(())
    }
}

pub struct SyncManager<P, K> {
    config: Config,
    provider: Arc<P>,
    key_manager: Arc<K>,
    ledger: Mutex<Ledger>,
    hd_wallet: Mutex<HdWallet>,
    watch: Mutex<AddressWatch>,
    block: Mutex<BlockCounter>,
    mempool_watch: Mutex<HashSet<String>>,
    halted: AtomicBool,
    syncing: AtomicBool,
    events: EventBus<WalletEvent>,
}

impl<P: ChainProvider, K: KeyManager> SyncManager<P, K> {
    /// Load every component from `store`.
    pub async fn new(
        config: Config,
        provider: Arc<P>,
        key_manager: Arc<K>,
        store: &dyn KeyValueStore,
        events: EventBus<WalletEvent>,
    ) -> Result<Self> {
        let state = StateDb::new(store)?;
        let ledger = Ledger {
            addresses: AddressStore::new(store)?,
            total: TotalBalance::load(state.clone()).await?,
            unspent: UtxoStore::load(store).await?,
        };
        let hd_wallet = HdWallet::init(store, config.coin_type()).await?;
        let watch = AddressWatch::load(state.clone(), config.max_script_watch).await?;
        let block = BlockCounter::load(state).await?;

        Ok(Self {
            config,
            provider,
            key_manager,
            ledger: Mutex::new(ledger),
            hd_wallet: Mutex::new(hd_wallet),
            watch: Mutex::new(watch),
            block: Mutex::new(block),
            mempool_watch: Mutex::new(HashSet::new()),
            halted: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
            events,
        })
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn subscribe(&self) -> EventReceiver<WalletEvent> {
        self.events.subscribe()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Ask a running pass to stop at its next checkpoint.
    pub fn stop_sync(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn resume_sync(&self) {
        self.halted.store(false, Ordering::Release);
    }

    pub async fn current_height(&self) -> u32 {
        self.block.lock().await.height()
    }

    /// Subscribe every stored watched script hash.
    pub async fn start_watching(&self) -> Result<()> {
        self.watch.lock().await.start_watching(self.provider.as_ref()).await?;
        Ok(())
    }

    /// Forget history, balances, UTXOs and scan progress. Derived addresses
    /// stay known.
    pub async fn reset(&self) -> Result<()> {
        self.hd_wallet.lock().await.reset_sync_state().await?;
        let mut ledger = self.ledger.lock().await;
        ledger.addresses.clear().await?;
        ledger.total.reset().await?;
        ledger.unspent.clear().await?;
        tracing::info!("Wallet sync state reset");
        Ok(())
    }

    /// Walk both branches of every account up to the gap limit.
    ///
    /// `SyncEnd` is emitted whenever the pass ends, including on error.
    pub async fn sync_account(&self, options: SyncOptions) -> Result<()> {
        if self.is_halted() {
            return Err(ConcurrencyError::SyncHalted.into());
        }
        if self.syncing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ConcurrencyError::AlreadySyncing.into());
        }
        let guard = SyncingGuard(&self.syncing);

        tracing::info!("Starting account sync (restart: {})", options.restart);
        let result = self.run_sync(options).await;
        match &result {
            Ok(()) if self.is_halted() => tracing::info!("Account sync halted"),
            Ok(()) => tracing::info!("Account sync complete"),
            Err(e) => tracing::error!("Account sync failed: {}", e),
        }

        drop(guard);
        self.events.emit(&[WalletEvent::SyncEnd]);
        result
    }

    async fn run_sync(&self, options: SyncOptions) -> Result<()> {
        if options.restart {
            self.reset().await?;
        }

        let limit = GapLimit::new(self.config.gap_limit);
        for branch in Branch::ALL {
            if self.is_halted() {
                return Ok(());
            }
            self.sync_branch(branch, limit).await?;
        }

        if !self.is_halted() {
            self.ledger.lock().await.unspent.process();
        }
        Ok(())
    }

    async fn sync_branch(&self, branch: Branch, limit: GapLimit) -> Result<()> {
        let (mut state, accounts, coin_type) = {
            let hd = self.hd_wallet.lock().await;
            (hd.sync_state(branch).await?, hd.accounts().to_vec(), hd.coin_type())
        };
        let start = state.resume_path(limit);
        tracing::debug!(
            "Scanning {} branch from {}",
            branch,
            start.as_ref().map_or_else(|| "the first address".to_string(), HdPath::to_string)
        );

        let mut scanner = PathScanner::new(branch, coin_type, &accounts, start);
        let mut account = state.path.as_ref().map(HdPath::account_index);

        while let Some(path) = scanner.next_path() {
            if self.is_halted() {
                break;
            }
            if account.is_some_and(|a| a != path.account_index()) {
                state.gap = 0;
                state.gap_end = None;
            }
            account = Some(path.account_index());

            let has_tx = match self.process_path(&path).await? {
                PathOutcome::Halted => break,
                PathOutcome::Empty => false,
                PathOutcome::HasTx => true,
            };

            state.record(&path, has_tx);
            {
                let mut hd = self.hd_wallet.lock().await;
                if has_tx {
                    hd.advance_past(&path).await?;
                }
                hd.set_sync_state(&state).await?;
            }
            self.events.emit(&[WalletEvent::SyncedPath {
                branch,
                path: path.clone(),
                has_tx,
                state: state.clone(),
            }]);

            if limit.is_reached(&state) {
                tracing::debug!("Gap limit reached on {} at {}", branch, path);
                scanner.halt();
            }
        }
        Ok(())
    }

    async fn process_path(&self, path: &HdPath) -> Result<PathOutcome> {
        let (script_hash, derived) =
            self.key_manager.path_to_script_hash(path, self.config.address_type)?;
        let history = self.provider.get_address_history(RequestOptions::default(), &script_hash).await?;
        if self.is_halted() {
            return Ok(PathOutcome::Halted);
        }
        if history.is_empty() {
            return Ok(PathOutcome::Empty);
        }

        tracing::debug!("{} ({}) has {} transactions", path, derived.address, history.len());
        self.hd_wallet.lock().await.add_address(derived.clone()).await?;
        self.ledger.lock().await.addresses.new_address(&derived.address).await?;

        let mut txs = Vec::with_capacity(history.len());
        for item in &history {
            txs.push(self.provider.get_transaction(&item.txid, RequestOptions::default()).await?);
        }
        self.process_history(txs).await?;
        Ok(PathOutcome::HasTx)
    }

    /// Ingest transactions into the ledgers and the history index.
    async fn process_history(&self, mut txs: Vec<TransactionRecord>) -> Result<()> {
        let current_height = self.current_height().await;
        let known = self.hd_wallet.lock().await.known_addresses();
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();

        let mut seen_in_mempool = Vec::new();
        {
            let mut ledger = self.ledger.lock().await;
            for tx in txs.iter_mut() {
                if tx.is_mempool() {
                    if tx.mempool_ts.is_none() {
                        tx.mempool_ts = Some(now);
                    }
                    seen_in_mempool.push(tx.txid.clone());
                }
                let plan = plan_ingestion(tx, current_height, self.config.min_block_confirm, |address| {
                    known.contains_key(address)
                });
                ledger.apply(&plan, &known).await?;
            }
            ledger.total.save().await?;
            ledger.addresses.store_tx_history(&txs).await?;
        }

        self.notify_mempool(&seen_in_mempool).await;
        Ok(())
    }

    async fn notify_mempool(&self, txids: &[String]) {
        let mut watched = self.mempool_watch.lock().await;
        let events: Vec<WalletEvent> = txids
            .iter()
            .filter(|txid| watched.remove(txid.as_str()))
            .map(|txid| WalletEvent::TxMempool {
                txid: txid.clone(),
            })
            .collect();
        drop(watched);
        self.events.emit(&events);
    }

    /// Reconcile a watched script hash whose status changed.
    pub async fn handle_address_change(&self, script_hash: &str, status: Option<String>) -> Result<()> {
        if self.is_halted() {
            return Ok(());
        }
        let Some((branch, last_status)) = self.watch.lock().await.find(script_hash) else {
            tracing::debug!("Ignoring notification for unwatched {}", script_hash);
            return Ok(());
        };
        if last_status == status {
            return Ok(());
        }

        tracing::debug!("Status of {} {} changed, refreshing history", branch, script_hash);
        let history = self.provider.get_address_history(RequestOptions::no_cache(), script_hash).await?;
        let mut txs = Vec::with_capacity(history.len());
        for item in &history {
            txs.push(self.provider.get_transaction(&item.txid, RequestOptions::no_cache()).await?);
        }
        if self.is_halted() {
            return Ok(());
        }
        self.process_history(txs).await?;

        {
            let mut watch = self.watch.lock().await;
            watch.update_status(script_hash, status).await?;
            watch.stop_watching(self.provider.as_ref(), Branch::Internal).await;
        }
        self.ledger.lock().await.unspent.process();
        self.events.emit(&[WalletEvent::NewTx]);
        Ok(())
    }

    /// Record a new chain tip and reconcile recent history against it.
    pub async fn update_block(&self, height: u32) -> Result<()> {
        let change = self.block.lock().await.set_block(height).await?;
        match change {
            BlockChange::Regressed {
                last,
                height,
            } => {
                self.events.emit(&[WalletEvent::ReorgDetected {
                    last,
                    height,
                }]);
            }
            BlockChange::Unchanged => {}
            BlockChange::Advanced(update) => {
                tracing::info!("New block {} (last {})", update.current, update.last);
                self.events.emit(&[WalletEvent::NewBlock {
                    height: update.current,
                    last: update.last,
                }]);
                if update.diff > 0 && !self.is_halted() {
                    self.reconcile_blocks(update).await?;
                }
            }
        }
        Ok(())
    }

    /// Re-read every stored transaction that may have changed state since
    /// `update.last`, plus the mempool bucket.
    ///
    /// Heights above `last - min_block_confirm` were still pending at the
    /// previous tip. On the first tip everything stored is re-read, since it
    /// was classified without one.
    async fn reconcile_blocks(&self, update: BlockUpdate) -> Result<()> {
        let start = cmp::max(1, update.last.saturating_sub(self.config.min_block_confirm));

        let mut txids: Vec<String> = Vec::new();
        {
            let ledger = self.ledger.lock().await;
            if update.last == 0 {
                ledger
                    .addresses
                    .get_transactions(|tx| {
                        if !txids.contains(&tx.txid) {
                            txids.push(tx.txid.clone());
                        }
                    })
                    .await?;
            } else {
                for height in start..=update.current {
                    for tx in ledger.addresses.get_tx_height(height).await? {
                        if !txids.contains(&tx.txid) {
                            txids.push(tx.txid);
                        }
                    }
                }
            }
            for tx in ledger.addresses.get_mempool_txs().await? {
                if !txids.contains(&tx.txid) {
                    txids.push(tx.txid);
                }
            }
        }
        if txids.is_empty() {
            return Ok(());
        }

        tracing::debug!("Re-reading {} transactions for tip {}", txids.len(), update.current);
        let mut txs = Vec::with_capacity(txids.len());
        for txid in &txids {
            txs.push(self.provider.get_transaction(txid, RequestOptions::no_cache()).await?);
        }
        self.process_history(txs).await?;
        self.ledger.lock().await.unspent.process();
        self.events.emit(&[WalletEvent::NewTx]);
        Ok(())
    }

    /// Derive the next address of a branch, start tracking and watching it.
    pub async fn new_address(&self, branch: Branch) -> Result<DerivedAddress> {
        let (script_hash, derived) = self
            .hd_wallet
            .lock()
            .await
            .get_new_address(branch, self.key_manager.as_ref(), self.config.address_type)
            .await?;
        self.ledger.lock().await.addresses.new_address(&derived.address).await?;
        self.watch.lock().await.watch_address(self.provider.as_ref(), &script_hash, branch).await?;
        tracing::debug!("New {} address {} at {}", branch, derived.address, derived.path);
        Ok(derived)
    }

    /// Received minus spent, for one address or the whole wallet.
    pub async fn get_balance(&self, address: Option<&str>) -> Result<BalanceSummary> {
        let ledger = self.ledger.lock().await;
        match address {
            None => Ok(ledger.total.spendable()),
            Some(address) => match ledger.addresses.get(address).await? {
                Some(record) => Ok(record.net()),
                None => Err(ValidationError::UnknownAddress(address.to_string()).into()),
            },
        }
    }

    pub async fn get_transactions<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(&TransactionRecord) + Send,
    {
        self.ledger.lock().await.addresses.get_transactions(visitor).await?;
        Ok(())
    }

    /// Select and lock UTXOs covering `target`.
    pub async fn utxo_for_amount(&self, target: Amount) -> Result<SelectionResult> {
        Ok(self.ledger.lock().await.unspent.select(target)?)
    }

    pub async fn unlock_utxo(&self, success: bool) -> Result<()> {
        self.ledger.lock().await.unspent.unlock(success).await?;
        Ok(())
    }

    /// Emit `TxMempool` the first time `txid` is ingested at mempool height.
    pub async fn watch_tx_mempool(&self, txid: &str) {
        self.mempool_watch.lock().await.insert(txid.to_string());
    }

    pub async fn add_sent_tx(&self, tx: &SentTransaction) -> Result<()> {
        self.ledger.lock().await.addresses.add_sent_tx(tx).await?;
        Ok(())
    }

    pub async fn get_sent_tx(&self, txid: &str) -> Result<Option<SentTransaction>> {
        Ok(self.ledger.lock().await.addresses.get_sent_tx(txid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalletError;
    use crate::storage::MemoryStore;
    use crate::test_utils::{MockKeyManager, MockProvider};

    async fn manager() -> SyncManager<MockProvider, MockKeyManager> {
        let store = MemoryStore::new();
        SyncManager::new(
            Config::regtest().with_gap_limit(3),
            Arc::new(MockProvider::new()),
            Arc::new(MockKeyManager::new()),
            &store,
            EventBus::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_sync_rejected() {
        let sync = manager().await;
        sync.syncing.store(true, Ordering::Release);
        let err = sync.sync_account(SyncOptions::default()).await.unwrap_err();
        assert!(matches!(err, WalletError::Concurrency(ConcurrencyError::AlreadySyncing)));
        assert!(sync.is_syncing());
    }

    #[tokio::test]
    async fn test_halted_sync_rejected() {
        let sync = manager().await;
        sync.stop_sync();
        let err = sync.sync_account(SyncOptions::default()).await.unwrap_err();
        assert!(matches!(err, WalletError::Concurrency(ConcurrencyError::SyncHalted)));

        sync.resume_sync();
        sync.sync_account(SyncOptions::default()).await.unwrap();
        assert!(!sync.is_syncing());
    }

    #[tokio::test]
    async fn test_empty_wallet_scans_gap_limit_per_branch() {
        let sync = manager().await;
        let mut events = sync.subscribe();
        sync.sync_account(SyncOptions::default()).await.unwrap();

        let mut paths = Vec::new();
        while let Ok(Some(event)) = events.try_recv() {
            if let WalletEvent::SyncedPath {
                path,
                has_tx,
                ..
            } = event
            {
                assert!(!has_tx);
                paths.push(path.to_string());
            }
        }
        assert_eq!(
            paths,
            vec![
                "m/84'/1'/0'/0/0",
                "m/84'/1'/0'/0/1",
                "m/84'/1'/0'/0/2",
                "m/84'/1'/0'/1/0",
                "m/84'/1'/0'/1/1",
                "m/84'/1'/0'/1/2",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_address_balance() {
        let sync = manager().await;
        let err = sync.get_balance(Some("bcrt1qnobody")).await.unwrap_err();
        assert!(matches!(err, WalletError::Validation(ValidationError::UnknownAddress(_))));
        assert_eq!(sync.get_balance(None).await.unwrap(), BalanceSummary::default());
    }
}
