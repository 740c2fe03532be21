//! End-to-end wallet flows: sync, send, and provider notifications driving
//! reconciliation through the background listener.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;
use wallet_sync::test_utils::{MockFeeEstimator, MockProvider, MockSigner, funding_tx, spending_tx};
use wallet_sync::{
    Amount, Denomination, EventReceiver, FeeRate, ProviderError, ProviderEvent, SendRequest, SyncOptions,
    WalletError, WalletEvent,
};

fn sat(v: i64) -> Amount {
    Amount::from_sat(v)
}

async fn funded_wallet(outputs: &[(u32, i64)]) -> (Arc<MockProvider>, TestWallet) {
    let provider = provider_at_tip().await;
    for (i, (index, value)) in outputs.iter().enumerate() {
        let tx = funding_tx(&format!("f{}", i), 90, &[(&receive(*index), *value)]);
        provider.add_transaction(&[&receive_hash(*index)], tx).await;
    }
    let wallet = memory_wallet(provider.clone()).await;
    wallet.sync_transactions(SyncOptions::default()).await.unwrap();
    (provider, wallet)
}

/// Events up to and including the next `NewTx`.
async fn until_new_tx(events: &mut EventReceiver<WalletEvent>) -> Vec<WalletEvent> {
    let mut seen = Vec::new();
    loop {
        let event = wait_for(events, |_| true).await;
        let done = event == WalletEvent::NewTx;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn has_mempool_event(events: &[WalletEvent]) -> bool {
    events.iter().any(|e| matches!(e, WalletEvent::TxMempool { .. }))
}

#[tokio::test]
async fn test_send_converges_and_is_recorded() {
    let (provider, wallet) = funded_wallet(&[(0, 100_000)]).await;

    let request = SendRequest::new("bcrt1qdest", "0.0003", Denomination::Main, FeeRate::new(5)).unwrap();
    let sent = wallet.send_transaction(request).await.unwrap();

    let vsize = MockSigner::vsize(1, 2);
    assert_eq!(sent.vsize, vsize);
    assert_eq!(sent.total_fee, sat(5 * vsize as i64));
    assert_eq!(sent.fee_rate, FeeRate::new(5));
    assert_eq!(sent.total_spent, sat(30_000) + sent.total_fee);
    assert_eq!(sent.utxos.len(), 1);
    assert_eq!(sent.change_address.address, change(0));
    assert_eq!(sent.outputs[1].value, sat(100_000 - 30_000) - sent.total_fee);

    assert_eq!(provider.broadcasts().await, vec![sent.raw_hex.clone()]);
    assert_eq!(wallet.get_sent_transaction(&sent.txid).await.unwrap(), Some(sent.clone()));

    // The spent output is committed and never offered again.
    let err = wallet.utxo_for_amount(sat(1_000)).await.unwrap_err();
    assert_eq!(err.category(), "funds");
}

#[tokio::test]
async fn test_dust_change_triggers_reselection() {
    let (_provider, wallet) = funded_wallet(&[(0, 10_000), (1, 50_000)]).await;

    let request = SendRequest {
        address: "bcrt1qdest".to_string(),
        amount: sat(9_000),
        fee_rate: FeeRate::new(10),
    };
    let sent = wallet.send_transaction(request).await.unwrap();

    let values: Vec<Amount> = sent.utxos.iter().map(|u| u.value).collect();
    assert_eq!(values, vec![sat(10_000), sat(50_000)]);
    assert_eq!(sent.vsize, MockSigner::vsize(2, 2));
    assert_eq!(sent.total_fee, sat(10 * MockSigner::vsize(2, 2) as i64));
    assert!(sent.outputs[1].value > sat(546));
}

#[tokio::test]
async fn test_broadcast_failure_releases_utxos() {
    let (provider, wallet) = funded_wallet(&[(0, 100_000)]).await;
    provider.reject_broadcasts(Some("bad-txns-inputs-missingorspent".to_string())).await;

    let request = SendRequest {
        address: "bcrt1qdest".to_string(),
        amount: sat(30_000),
        fee_rate: FeeRate::new(5),
    };
    let err = wallet.send_transaction(request.clone()).await.unwrap_err();
    assert!(matches!(err, WalletError::Provider(ProviderError::Rejected(_))));
    assert!(provider.broadcasts().await.is_empty());

    // The lease was returned, so the same output can back a retry.
    let selection = wallet.utxo_for_amount(sat(30_000)).await.unwrap();
    assert_eq!(selection.total, sat(100_000));
    wallet.unlock_utxo(false).await.unwrap();

    provider.reject_broadcasts(None).await;
    let sent = wallet.send_transaction(request).await.unwrap();
    assert_eq!(sent.utxos.len(), 1);
}

#[tokio::test]
async fn test_insufficient_funds() {
    let (_provider, wallet) = funded_wallet(&[(0, 10_000)]).await;
    let request = SendRequest {
        address: "bcrt1qdest".to_string(),
        amount: sat(20_000),
        fee_rate: FeeRate::new(1),
    };
    let err = wallet.send_transaction(request).await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds(_)));

    // Nothing stays locked after the failed send.
    assert_eq!(wallet.utxo_for_amount(sat(5_000)).await.unwrap().total, sat(10_000));
}

#[tokio::test]
async fn test_selection_lease_blocks_second_selection() {
    let (_provider, wallet) = funded_wallet(&[(0, 10_000), (1, 20_000)]).await;

    wallet.utxo_for_amount(sat(5_000)).await.unwrap();
    let err = wallet.utxo_for_amount(sat(5_000)).await.unwrap_err();
    assert!(err.is_retryable());

    wallet.unlock_utxo(false).await.unwrap();
    assert!(wallet.utxo_for_amount(sat(5_000)).await.is_ok());
}

#[tokio::test]
async fn test_sent_tx_flows_from_mempool_to_confirmed() {
    let (provider, wallet) = funded_wallet(&[(0, 100_000)]).await;
    let mut events = wallet.subscribe();

    let request = SendRequest {
        address: "bcrt1qdest".to_string(),
        amount: sat(30_000),
        fee_rate: FeeRate::new(5),
    };
    let sent = wallet.send_transaction(request).await.unwrap();
    let change_value = sent.outputs[1].value.to_sat();

    // The provider sees the broadcast and notifies the change address.
    let tx = spending_tx(&sent.txid, 0, &sent.utxos, &[("bcrt1qdest", 30_000), (&change(0), change_value)]);
    provider.add_transaction(&[&receive_hash(0), &change_hash(0)], tx).await;
    provider.emit(ProviderEvent::AddressChanged {
        script_hash: change_hash(0),
        status: Some("status-1".to_string()),
    });

    let seen = wait_for(&mut events, |e| matches!(e, WalletEvent::TxMempool { .. })).await;
    assert_eq!(
        seen,
        WalletEvent::TxMempool {
            txid: sent.txid.clone(),
        }
    );
    wait_for(&mut events, |e| *e == WalletEvent::NewTx).await;

    let balance = wallet.get_balance(None).await.unwrap();
    assert_eq!(balance.confirmed, sat(100_000));
    assert_eq!(balance.mempool, sat(change_value - 100_000));
    assert_eq!(balance.consolidated, sat(change_value));
    assert!(provider.no_cache_fetches() > 0);
    assert!(provider.unsubscribed().await.contains(&change_hash(0)));

    // A second status change for the same transaction does not repeat TxMempool.
    provider.emit(ProviderEvent::AddressChanged {
        script_hash: change_hash(0),
        status: Some("status-2".to_string()),
    });
    assert!(!has_mempool_event(&until_new_tx(&mut events).await));

    provider.set_tx_height(&sent.txid, TIP + 1).await;
    provider.emit(ProviderEvent::NewBlock {
        height: TIP + 1,
    });
    wait_for(&mut events, |e| *e == WalletEvent::NewTx).await;
    assert_eq!(wallet.get_balance(None).await.unwrap().pending, sat(change_value - 100_000));

    provider.emit(ProviderEvent::NewBlock {
        height: TIP + 2,
    });
    let later = until_new_tx(&mut events).await;
    assert_eq!(
        later.first(),
        Some(&WalletEvent::NewBlock {
            height: TIP + 2,
            last: TIP + 1,
        })
    );
    assert!(!has_mempool_event(&later));

    let balance = wallet.get_balance(None).await.unwrap();
    assert_eq!(balance.mempool, Amount::ZERO);
    assert_eq!(balance.pending, Amount::ZERO);
    assert_eq!(balance.confirmed, sat(change_value));

    wallet.close().await.unwrap();
}

#[tokio::test]
async fn test_unchanged_status_is_ignored() {
    let provider = provider_at_tip().await;
    let wallet = memory_wallet(provider.clone()).await;
    let mut events = wallet.subscribe();

    let address = wallet.get_new_address().await.unwrap();
    assert_eq!(address.address, receive(0));

    // Watched with no history, so a `None` status is not a change.
    provider.emit(ProviderEvent::AddressChanged {
        script_hash: receive_hash(0),
        status: None,
    });
    provider.emit(ProviderEvent::NewBlock {
        height: TIP + 1,
    });
    wait_for(&mut events, |e| matches!(e, WalletEvent::NewBlock { .. })).await;
    assert_eq!(provider.history_calls(), 0);
    assert!(wallet.get_balance(Some(address.address.as_str())).await.is_ok());
}

#[tokio::test]
async fn test_pause_and_resume_sync() {
    let (_provider, wallet) = funded_wallet(&[]).await;

    wallet.pause_sync().await;
    assert!(!wallet.is_syncing());
    let err = wallet.sync_transactions(SyncOptions::default()).await.unwrap_err();
    assert_eq!(err.category(), "concurrency");

    wallet.resume_sync();
    wallet.sync_transactions(SyncOptions::default()).await.unwrap();
}

#[tokio::test]
async fn test_fee_estimates_are_cached() {
    let provider = provider_at_tip().await;
    let wallet = memory_wallet(provider).await;
    assert!(matches!(wallet.estimate_fee().await, Err(WalletError::Config(_))));

    let estimator = MockFeeEstimator::new(FeeRate::new(12));
    let calls = estimator.calls();
    let wallet = wallet.with_fee_estimator(estimator);

    assert_eq!(wallet.estimate_fee().await.unwrap().fastest, FeeRate::new(12));
    assert_eq!(wallet.estimate_fee().await.unwrap().economy, FeeRate::new(12));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
