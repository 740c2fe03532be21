//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wallet_sync::event_bus::EventReceiver;
use wallet_sync::test_utils::{MockKeyManager, MockProvider, MockSigner};
use wallet_sync::{Branch, Config, KeyValueStore, MemoryStore, SyncManager, UtxoWallet, WalletEvent};

pub const TIP: u32 = 100;

pub type TestWallet = UtxoWallet<MockProvider, MockKeyManager, MockSigner>;

pub fn config() -> Config {
    Config::regtest().with_gap_limit(3)
}

pub fn receive(index: u32) -> String {
    MockKeyManager::address_at(Branch::External, index)
}

pub fn receive_hash(index: u32) -> String {
    MockKeyManager::script_hash_at(Branch::External, index)
}

pub fn change(index: u32) -> String {
    MockKeyManager::address_at(Branch::Internal, index)
}

pub fn change_hash(index: u32) -> String {
    MockKeyManager::script_hash_at(Branch::Internal, index)
}

pub async fn provider_at_tip() -> Arc<MockProvider> {
    let provider = Arc::new(MockProvider::new());
    provider.set_tip(TIP).await;
    provider
}

/// A manager that has not seen a chain tip yet.
pub async fn manager_with(
    config: Config,
    provider: Arc<MockProvider>,
    store: &dyn KeyValueStore,
) -> SyncManager<MockProvider, MockKeyManager> {
    SyncManager::new(config, provider, Arc::new(MockKeyManager::new()), store, Default::default())
        .await
        .unwrap()
}

pub async fn sync_manager(
    provider: Arc<MockProvider>,
    store: &dyn KeyValueStore,
) -> SyncManager<MockProvider, MockKeyManager> {
    let sync = manager_with(config(), provider, store).await;
    sync.update_block(TIP).await.unwrap();
    sync
}

pub async fn wallet(provider: Arc<MockProvider>, store: Arc<dyn KeyValueStore>) -> TestWallet {
    let wallet = UtxoWallet::new(
        config(),
        provider,
        Arc::new(MockKeyManager::new()),
        Arc::new(MockSigner::new()),
        store,
    )
    .await
    .unwrap();
    wallet.init().await.unwrap();
    wallet
}

pub async fn memory_wallet(provider: Arc<MockProvider>) -> TestWallet {
    wallet(provider, Arc::new(MemoryStore::new())).await
}

/// Receive events until one matches, failing after a few seconds.
pub async fn wait_for<F>(events: &mut EventReceiver<WalletEvent>, mut matches: F) -> WalletEvent
where
    F: FnMut(&WalletEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream failed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for wallet event")
}

/// Everything queued on a receiver right now.
pub fn drain(events: &mut EventReceiver<WalletEvent>) -> Vec<WalletEvent> {
    let mut out = Vec::new();
    while let Ok(Some(event)) = events.try_recv() {
        out.push(event);
    }
    out
}
