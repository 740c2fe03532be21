//! Sync and transaction building for a self-custodial UTXO wallet.
//!
//! This crate keeps a wallet's ledgers in step with an indexing service and
//! builds payments from its UTXO set. It can:
//!
//! - Scan both branches of every HD account up to the gap limit
//! - Track per-address and wallet-wide balances by confirmation state
//! - Follow address status and new block notifications
//! - Select, lock and commit UTXOs for payments
//! - Build fee-converged transactions and broadcast them
//! - Persist everything to a namespaced key-value store
//!
//! Keys, signing and network access are behind the [`KeyManager`],
//! [`TransactionSigner`] and [`ChainProvider`] traits.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wallet_sync::{
//!     ChainProvider, Config, DiskStore, KeyManager, SyncOptions, TransactionSigner, UtxoWallet,
//! };
//!
//! async fn run<P, K, S>(provider: P, keys: K, signer: S) -> Result<(), Box<dyn std::error::Error>>
//! where
//!     P: ChainProvider + 'static,
//!     K: KeyManager + 'static,
//!     S: TransactionSigner + 'static,
//! {
//!     let store = Arc::new(DiskStore::new("./.tmp/wallet").await?);
//!     let wallet =
//!         UtxoWallet::new(Config::testnet(), Arc::new(provider), Arc::new(keys), Arc::new(signer), store)
//!             .await?;
//!
//!     wallet.init().await?;
//!     wallet.sync_transactions(SyncOptions::default()).await?;
//!     println!("Balance: {:?}", wallet.get_balance(None).await?);
//!
//!     wallet.close().await?;
//!     Ok(())
//! }
//! ```

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub mod address_store;
pub mod address_watch;
pub mod block_counter;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod fee;
pub mod hd_wallet;
pub mod key_manager;
pub mod logging;
pub mod provider;
pub mod signer;
pub mod state;
pub mod storage;
pub mod sync_manager;
pub mod total_balance;
pub mod transaction_builder;
pub mod utxo_store;
pub mod wallet;

// Re-export main types for convenience
pub use config::{Config, Network};
pub use error::{
    ConcurrencyError, LoggingError, LoggingResult, ProviderError, ProviderResult, Result,
    StorageError, StorageResult, ValidationError, WalletError,
};
pub use event_bus::{EventBus, EventReceiver};
pub use events::WalletEvent;
pub use fee::{CachedFeeEstimator, FeeEstimate, FeeEstimator};
pub use key_manager::{DerivedAddress, KeyManager};
pub use logging::{LogFileConfig, LoggingConfig, LoggingGuard, init_console_logging, init_logging};
pub use provider::{ChainProvider, ProviderEvent, RequestOptions};
pub use signer::{SignedTransaction, TransactionSigner, TxOutput};
pub use storage::{DiskStore, KeyValueStore, MemoryStore};
pub use sync_manager::{SyncManager, SyncOptions};
pub use transaction_builder::{SendRequest, SentTransaction, TransactionBuilder};
pub use wallet::UtxoWallet;

pub use tracing::level_filters::LevelFilter;

// Re-export the ledger primitives
pub use wallet_ledger::{
    Amount, BalanceEntry, BalanceSummary, Branch, Denomination, FeeRate, HdPath, SyncState,
    TransactionRecord, TxState, Utxo,
};

/// Current version of the wallet-sync library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
