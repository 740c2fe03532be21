//! Chain data provider interface.
//!
//! The wallet never talks to the network itself. An indexing service
//! (typically an Electrum-style server) is reached through [`ChainProvider`],
//! which answers history and transaction queries and pushes address status
//! changes and new block heights through its event stream.

use async_trait::async_trait;
use wallet_ledger::{HistoryItem, TransactionRecord};

use crate::error::ProviderResult;
use crate::event_bus::EventReceiver;

/// Per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Whether the provider may answer from its cache.
    pub cache: bool,
}

impl RequestOptions {
    /// Force a fresh answer from the server.
    pub fn no_cache() -> Self {
        Self {
            cache: false,
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cache: true,
        }
    }
}

/// Notifications pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The status of a subscribed script hash changed.
    AddressChanged {
        script_hash: String,
        status: Option<String>,
    },
    /// A new chain tip.
    NewBlock {
        height: u32,
    },
}

#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Confirmed and mempool history of a script hash. Mempool entries carry
    /// height 0.
    async fn get_address_history(
        &self,
        opts: RequestOptions,
        script_hash: &str,
    ) -> ProviderResult<Vec<HistoryItem>>;

    /// A transaction with its inputs resolved to the outputs they spend.
    async fn get_transaction(
        &self,
        txid: &str,
        opts: RequestOptions,
    ) -> ProviderResult<TransactionRecord>;

    /// Broadcast a raw transaction and return its txid.
    async fn broadcast_transaction(&self, raw_hex: &str) -> ProviderResult<String>;

    /// Subscribe to status changes of a script hash. Returns the current
    /// status, `None` for a script with no history.
    async fn subscribe_to_address(&self, script_hash: &str) -> ProviderResult<Option<String>>;

    async fn unsubscribe_from_address(&self, script_hash: &str) -> ProviderResult<()>;

    /// Subscribe to new blocks. Returns the current tip height.
    async fn subscribe_to_blocks(&self) -> ProviderResult<u32>;

    /// Stream of subscription notifications.
    fn events(&self) -> EventReceiver<ProviderEvent>;
}
