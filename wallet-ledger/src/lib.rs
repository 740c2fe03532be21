//! Ledger primitives for a self-custodial UTXO wallet.
//!
//! This crate holds the synchronous, I/O-free parts of wallet sync:
//! - Fixed-point [`Amount`]s and [`FeeRate`]s
//! - Per-state [`BalanceEntry`] ledgers and [`AddressRecord`]s
//! - HD path algebra and the sequential [`PathScanner`]
//! - Gap limit tracking per branch
//! - The [`UtxoSet`] with lock-based smallest-first selection
//! - Classification of transactions into ledger updates

extern crate alloc;

pub mod amount;
pub mod balance;
pub mod coin_selection;
pub mod derivation;
pub mod error;
pub mod fee;
pub mod gap_limit;
pub mod ingest;
pub mod transaction;
pub mod utxo;

pub use amount::{Amount, Denomination};
pub use balance::{AddressRecord, BalanceEntry, BalanceSummary, Direction, Point, TxState};
pub use coin_selection::{DUST_LIMIT, SelectionError, SelectionResult};
pub use derivation::{AccountIndex, AddressType, Branch, HdPath, PathScanner, PathSegment};
pub use error::{AmountError, Error, PathError, Result};
pub use fee::FeeRate;
pub use gap_limit::{DEFAULT_GAP_LIMIT, GapLimit, MAX_GAP_LIMIT, SyncState};
pub use ingest::{IngestPlan, LedgerUpdate, classify_tx_state, plan_ingestion};
pub use transaction::{HistoryItem, MEMPOOL_HEIGHT, TransactionRecord};
pub use utxo::{OutPoint, SpentOutput, Utxo, UtxoSet};
