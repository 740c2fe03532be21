//! Notifications emitted by the wallet.

use wallet_ledger::{Branch, HdPath, SyncState};

/// Events published on the wallet's event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A path was inspected during a sync pass.
    SyncedPath {
        branch: Branch,
        path: HdPath,
        has_tx: bool,
        state: SyncState,
    },

    /// Balances changed after an address or block reconciliation.
    NewTx,

    /// A sync pass finished, either completely or because it was halted.
    SyncEnd,

    /// The chain tip advanced.
    NewBlock {
        height: u32,
        last: u32,
    },

    /// A transaction broadcast by this wallet was seen in the mempool.
    TxMempool {
        txid: String,
    },

    /// The chain tip went backwards. Nothing is rolled back.
    ReorgDetected {
        last: u32,
        height: u32,
    },
}

impl WalletEvent {
    pub fn description(&self) -> String {
        match self {
            WalletEvent::SyncedPath {
                branch,
                path,
                has_tx,
                state,
            } => format!(
                "SyncedPath({} {} has_tx={} gap={})",
                branch, path, has_tx, state.gap
            ),
            WalletEvent::NewTx => "NewTx".to_string(),
            WalletEvent::SyncEnd => "SyncEnd".to_string(),
            WalletEvent::NewBlock {
                height,
                last,
            } => format!("NewBlock(height={}, last={})", height, last),
            WalletEvent::TxMempool {
                txid,
            } => format!("TxMempool({})", txid),
            WalletEvent::ReorgDetected {
                last,
                height,
            } => format!("ReorgDetected(last={}, height={})", last, height),
        }
    }
}
