use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use wallet_ledger::{HistoryItem, TransactionRecord};

use crate::error::{ProviderError, ProviderResult};
use crate::event_bus::{EventBus, EventReceiver};
use crate::provider::{ChainProvider, ProviderEvent, RequestOptions};

type HistoryHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ChainState {
    transactions: HashMap<String, TransactionRecord>,
    histories: HashMap<String, Vec<String>>,
    statuses: HashMap<String, Option<String>>,
    broadcasts: Vec<String>,
    unsubscribed: Vec<String>,
    history_failure: Option<ProviderError>,
    broadcast_rejection: Option<String>,
    history_hook: Option<(usize, HistoryHook)>,
    tip: u32,
}

/// In-memory chain provider.
///
/// Histories are derived from the registered transactions, each listed at
/// the height its record currently carries. Notifications are only sent
/// when a test calls [`emit`](Self::emit).
pub struct MockProvider {
    state: Mutex<ChainState>,
    events: EventBus<ProviderEvent>,
    fail_subscriptions: AtomicBool,
    history_calls: AtomicUsize,
    no_cache_fetches: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            events: EventBus::default(),
            fail_subscriptions: AtomicBool::new(false),
            history_calls: AtomicUsize::new(0),
            no_cache_fetches: AtomicUsize::new(0),
        }
    }

    /// Register a transaction touching the given script hashes.
    pub async fn add_transaction(&self, script_hashes: &[&str], tx: TransactionRecord) {
        let mut state = self.state.lock().await;
        for script_hash in script_hashes {
            let history = state.histories.entry(script_hash.to_string()).or_default();
            if !history.contains(&tx.txid) {
                history.push(tx.txid.clone());
            }
        }
        state.transactions.insert(tx.txid.clone(), tx);
    }

    /// Move a registered transaction to another height, e.g. when it is mined.
    pub async fn set_tx_height(&self, txid: &str, height: u32) {
        if let Some(tx) = self.state.lock().await.transactions.get_mut(txid) {
            tx.height = height;
        }
    }

    pub async fn set_status(&self, script_hash: &str, status: Option<String>) {
        self.state.lock().await.statuses.insert(script_hash.to_string(), status);
    }

    /// Make every history request fail with `error` until cleared.
    pub async fn fail_history(&self, error: Option<ProviderError>) {
        self.state.lock().await.history_failure = error;
    }

    pub async fn reject_broadcasts(&self, message: Option<String>) {
        self.state.lock().await.broadcast_rejection = message;
    }

    /// Run `action` while serving the `call`-th history request (counted
    /// from 1 over the provider's lifetime), before it answers.
    pub async fn on_history_call<F>(&self, call: usize, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.lock().await.history_hook = Some((call, Box::new(action)));
    }

    pub async fn set_tip(&self, height: u32) {
        self.state.lock().await.tip = height;
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Push a notification to every listener.
    pub fn emit(&self, event: ProviderEvent) {
        self.events.emit(&[event]);
    }

    /// Raw transactions accepted so far.
    pub async fn broadcasts(&self) -> Vec<String> {
        self.state.lock().await.broadcasts.clone()
    }

    pub async fn unsubscribed(&self) -> Vec<String> {
        self.state.lock().await.unsubscribed.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Requests made with the cache bypassed.
    pub fn no_cache_fetches(&self) -> usize {
        self.no_cache_fetches.load(Ordering::SeqCst)
    }

    fn count_request(&self, opts: RequestOptions) {
        if !opts.cache {
            self.no_cache_fetches.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn get_address_history(
        &self,
        opts: RequestOptions,
        script_hash: &str,
    ) -> ProviderResult<Vec<HistoryItem>> {
        let call = self.history_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.count_request(opts);

        let state = self.state.lock().await;
        if let Some((at, action)) = &state.history_hook {
            if *at == call {
                action();
            }
        }
        if let Some(error) = &state.history_failure {
            return Err(error.clone());
        }
        let items = state
            .histories
            .get(script_hash)
            .map(|txids| {
                txids
                    .iter()
                    .filter_map(|txid| state.transactions.get(txid))
                    .map(|tx| HistoryItem {
                        txid: tx.txid.clone(),
                        height: tx.height,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn get_transaction(
        &self,
        txid: &str,
        opts: RequestOptions,
    ) -> ProviderResult<TransactionRecord> {
        self.count_request(opts);
        self.state
            .lock()
            .await
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(txid.to_string()))
    }

    async fn broadcast_transaction(&self, raw_hex: &str) -> ProviderResult<String> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.broadcast_rejection {
            return Err(ProviderError::Rejected(message.clone()));
        }
        let txid = hex::decode(raw_hex)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| ProviderError::Rejected("TX decode failed".to_string()))?;
        state.broadcasts.push(raw_hex.to_string());
        Ok(txid)
    }

    async fn subscribe_to_address(&self, script_hash: &str) -> ProviderResult<Option<String>> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(ProviderError::Subscription(script_hash.to_string()));
        }
        Ok(self.state.lock().await.statuses.get(script_hash).cloned().flatten())
    }

    async fn unsubscribe_from_address(&self, script_hash: &str) -> ProviderResult<()> {
        self.state.lock().await.unsubscribed.push(script_hash.to_string());
        Ok(())
    }

    async fn subscribe_to_blocks(&self) -> ProviderResult<u32> {
        Ok(self.state.lock().await.tip)
    }

    fn events(&self) -> EventReceiver<ProviderEvent> {
        self.events.subscribe()
    }
}
