//! Error types for wallet sync and transaction building.

use std::io;
use thiserror::Error;
use wallet_ledger::{Amount, AmountError, FeeRate, PathError, SelectionError};

/// Main error type for the wallet.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Concurrency error: {0}")]
    Concurrency(#[from] ConcurrencyError),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(SelectionError),

    #[error("Send amount {amount} must be above the dust limit of {limit}")]
    DustLimit {
        amount: Amount,
        limit: Amount,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key manager error: {0}")]
    Key(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl WalletError {
    /// Returns a static string representing the error category based on the variant
    pub fn category(&self) -> &'static str {
        match self {
            WalletError::Validation(_) | WalletError::DustLimit { .. } => "validation",
            WalletError::Concurrency(_) => "concurrency",
            WalletError::InsufficientFunds(_) => "funds",
            WalletError::Provider(_) => "provider",
            WalletError::Storage(_) => "storage",
            WalletError::Key(_) | WalletError::Signing(_) => "keys",
            WalletError::Config(_) | WalletError::Logging(_) => "config",
        }
    }

    /// Concurrency errors clear once the competing operation finishes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Concurrency(_))
    }
}

impl From<SelectionError> for WalletError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::NotReady => WalletError::Concurrency(ConcurrencyError::UtxoSetNotReady),
            other => WalletError::InsufficientFunds(other),
        }
    }
}

impl From<AmountError> for WalletError {
    fn from(err: AmountError) -> Self {
        WalletError::Validation(ValidationError::InvalidAmount(err))
    }
}

impl From<PathError> for WalletError {
    fn from(err: PathError) -> Self {
        WalletError::Validation(ValidationError::InvalidPath(err))
    }
}

/// Input rejected before any I/O.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid fee rate {0}")]
    InvalidFee(FeeRate),

    #[error("Invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("Invalid HD path: {0}")]
    InvalidPath(PathError),

    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(String),

    #[error("Address not valid or not processed for balance: {0}")]
    UnknownAddress(String),
}

/// An operation collided with one already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    #[error("Sync already in progress")]
    AlreadySyncing,

    #[error("Sync is halted")]
    SyncHalted,

    #[error("UTXO set not ready, a transaction is in progress")]
    UtxoSetNotReady,
}

/// Errors reported by the chain provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    /// The server refused a broadcast; carries the first line of its message.
    #[error("Broadcast failed: {0}")]
    Rejected(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Provider closed")]
    Closed,
}

/// Storage-related errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Store closed")]
    Closed,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Logging-related errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] io::Error),

    #[error("Subscriber initialization failed: {0}")]
    SubscriberInit(String),

    #[error("Log rotation failed: {0}")]
    RotationFailed(String),
}

/// Type alias for Result with WalletError.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Type alias for storage operation results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Type alias for provider operation results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Type alias for logging operation results.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_category() {
        assert_eq!(WalletError::from(ConcurrencyError::AlreadySyncing).category(), "concurrency");
        assert_eq!(WalletError::from(ProviderError::Closed).category(), "provider");
        assert_eq!(
            WalletError::from(ValidationError::InvalidFee(FeeRate::new(0))).category(),
            "validation"
        );
        assert_eq!(
            WalletError::DustLimit {
                amount: Amount::from_sat(10),
                limit: Amount::from_sat(546),
            }
            .category(),
            "validation"
        );
        assert_eq!(WalletError::from(StorageError::Closed).category(), "storage");
    }

    #[test]
    fn test_selection_error_mapping() {
        let not_ready = WalletError::from(SelectionError::NotReady);
        assert!(matches!(
            not_ready,
            WalletError::Concurrency(ConcurrencyError::UtxoSetNotReady)
        ));
        assert!(not_ready.is_retryable());

        let funds = WalletError::from(SelectionError::InsufficientFunds {
            available: Amount::from_sat(1),
            required: Amount::from_sat(2),
        });
        assert_eq!(funds.category(), "funds");
        assert!(!funds.is_retryable());
        assert!(funds.to_string().contains("available"));
    }
}
