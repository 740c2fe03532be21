//! Coin selection for transaction building
//!
//! Only smallest-first accumulation is supported: it consolidates small
//! outputs first and keeps the UTXO set compact.

use crate::amount::Amount;
use crate::utxo::Utxo;

/// Standard dust threshold in base units.
pub const DUST_LIMIT: i64 = 546;

/// Result of UTXO selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected UTXOs, in the order they were taken
    pub selected: Vec<Utxo>,
    /// Total value of selected UTXOs
    pub total: Amount,
    /// Target amount
    pub target: Amount,
    /// `total - target`, usable as change
    pub difference: Amount,
}

/// Accumulate candidates, already sorted ascending by value, until the
/// running total covers `target`.
///
/// On failure returns the total that was available.
pub(crate) fn accumulate<'a, I>(candidates: I, target: Amount) -> Result<SelectionResult, Amount>
where
    I: IntoIterator<Item = &'a Utxo>,
{
    let mut selected = Vec::new();
    let mut total = Amount::ZERO;

    for utxo in candidates {
        selected.push(utxo.clone());
        total += utxo.value;
        if total >= target {
            return Ok(SelectionResult {
                selected,
                total,
                target,
                difference: total - target,
            });
        }
    }

    Err(total)
}

/// Errors that can occur during coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// A selection is in flight or the set has not been processed yet
    NotReady,
    /// No UTXOs available for selection
    NoUtxosAvailable,
    /// Insufficient funds
    InsufficientFunds {
        available: Amount,
        required: Amount,
    },
}

impl core::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotReady => write!(f, "UTXO set not ready, selection in progress"),
            Self::NoUtxosAvailable => write!(f, "No UTXOs available for selection"),
            Self::InsufficientFunds {
                available,
                required,
            } => {
                write!(f, "Insufficient funds: available {}, required {}", available, required)
            }
        }
    }
}

impl std::error::Error for SelectionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::test_utxo;

    #[test]
    fn test_smallest_first_accumulation() {
        let utxos = [test_utxo("a", 0, 10_000), test_utxo("b", 0, 20_000), test_utxo("c", 0, 30_000)];
        let result = accumulate(utxos.iter(), Amount::from_sat(25_000)).unwrap();

        assert_eq!(result.selected.len(), 2);
        assert_eq!(result.total, Amount::from_sat(30_000));
        assert_eq!(result.difference, Amount::from_sat(5_000));
    }

    #[test]
    fn test_exact_match() {
        let utxos = [test_utxo("a", 0, 10_000)];
        let result = accumulate(utxos.iter(), Amount::from_sat(10_000)).unwrap();
        assert_eq!(result.difference, Amount::ZERO);
    }

    #[test]
    fn test_insufficient_returns_available() {
        let utxos = [test_utxo("a", 0, 10_000), test_utxo("b", 1, 20_000)];
        assert_eq!(accumulate(utxos.iter(), Amount::from_sat(50_000)), Err(Amount::from_sat(30_000)));
    }
}
