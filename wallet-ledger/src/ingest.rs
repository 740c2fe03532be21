//! VIN/VOUT classification
//!
//! Turns a [`TransactionRecord`] into the ledger updates it implies for the
//! wallet's own addresses. The result depends only on the record, the chain
//! tip and the set of tracked addresses, so re-planning the same transaction
//! at a later height simply yields the same points under a newer state.

use crate::amount::Amount;
use crate::balance::{Direction, TxState};
use crate::transaction::{MEMPOOL_HEIGHT, TransactionRecord};
use crate::utxo::{SpentOutput, Utxo};

/// Confirmation state of a transaction at `height` with the chain tip at
/// `current_height`.
pub fn classify_tx_state(height: u32, current_height: u32, min_confirm: u32) -> TxState {
    if height == MEMPOOL_HEIGHT {
        return TxState::Mempool;
    }
    let confirmations = i64::from(current_height) - i64::from(height);
    if confirmations >= i64::from(min_confirm) {
        TxState::Confirmed
    } else {
        TxState::Pending
    }
}

/// A single change to an address ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// An output paying a tracked address.
    Received(Utxo),
    /// A tracked address's output being spent.
    Spent(SpentOutput),
    /// Fee of a transaction a tracked address paid into.
    Fee {
        address: String,
        txid: String,
        amount: Amount,
    },
}

impl LedgerUpdate {
    pub fn address(&self) -> &str {
        match self {
            LedgerUpdate::Received(utxo) => &utxo.address,
            LedgerUpdate::Spent(spent) => &spent.address,
            LedgerUpdate::Fee {
                address,
                ..
            } => address,
        }
    }

    /// Point id under which the update is recorded.
    pub fn point_id(&self) -> String {
        match self {
            LedgerUpdate::Received(utxo) => utxo.point_id(),
            LedgerUpdate::Spent(spent) => spent.point_id(),
            LedgerUpdate::Fee {
                txid,
                ..
            } => txid.clone(),
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            LedgerUpdate::Received(utxo) => utxo.value,
            LedgerUpdate::Spent(spent) => spent.value,
            LedgerUpdate::Fee {
                amount,
                ..
            } => *amount,
        }
    }

    /// `None` for fee updates.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            LedgerUpdate::Received(_) => Some(Direction::Out),
            LedgerUpdate::Spent(_) => Some(Direction::In),
            LedgerUpdate::Fee {
                ..
            } => None,
        }
    }
}

/// Updates implied by one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPlan {
    pub txid: String,
    pub height: u32,
    pub state: TxState,
    /// Outputs first, then spent inputs, then fees.
    pub updates: Vec<LedgerUpdate>,
}

impl IngestPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Classify `tx` and collect the updates touching tracked addresses.
///
/// The fee is attributed once per tracked address that has an input in the
/// transaction, under the transaction id.
pub fn plan_ingestion<F>(
    tx: &TransactionRecord,
    current_height: u32,
    min_confirm: u32,
    is_tracked: F,
) -> IngestPlan
where
    F: Fn(&str) -> bool,
{
    let state = classify_tx_state(tx.height, current_height, min_confirm);
    let mut updates = Vec::new();

    for output in tx.outputs.iter().filter(|o| is_tracked(&o.address)) {
        let mut utxo = output.clone();
        utxo.height = tx.height;
        updates.push(LedgerUpdate::Received(utxo));
    }

    let mut payers: Vec<&str> = Vec::new();
    for input in tx.inputs.iter().filter(|i| is_tracked(&i.address)) {
        updates.push(LedgerUpdate::Spent(input.clone()));
        if !payers.contains(&input.address.as_str()) {
            payers.push(&input.address);
        }
    }

    if tx.fee > Amount::ZERO {
        for address in payers {
            updates.push(LedgerUpdate::Fee {
                address: address.to_string(),
                txid: tx.txid.clone(),
                amount: tx.fee,
            });
        }
    }

    IngestPlan {
        txid: tx.txid.clone(),
        height: tx.height,
        state,
        updates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::test_utxo;
    use test_case::test_case;

    #[test_case(0, 100, 1, TxState::Mempool ; "mempool")]
    #[test_case(100, 100, 1, TxState::Pending ; "tip block")]
    #[test_case(99, 100, 1, TxState::Confirmed ; "one confirmation")]
    #[test_case(95, 100, 6, TxState::Pending ; "below threshold")]
    #[test_case(94, 100, 6, TxState::Confirmed ; "at threshold")]
    #[test_case(105, 100, 1, TxState::Pending ; "tip lagging")]
    fn test_classify(height: u32, current: u32, min_confirm: u32, expected: TxState) {
        assert_eq!(classify_tx_state(height, current, min_confirm), expected);
    }

    fn record(height: u32) -> TransactionRecord {
        let mut mine = test_utxo("t1", 0, 5_000);
        mine.address = "mine".to_string();
        let mut change = test_utxo("t1", 1, 3_000);
        change.address = "change".to_string();
        let theirs = test_utxo("t1", 2, 9_000);
        TransactionRecord {
            txid: "t1".to_string(),
            height,
            fee: Amount::from_sat(200),
            inputs: vec![
                SpentOutput {
                    prev_txid: "p".to_string(),
                    prev_index: 0,
                    txid: "t1".to_string(),
                    address: "mine".to_string(),
                    value: Amount::from_sat(10_000),
                },
                SpentOutput {
                    prev_txid: "p".to_string(),
                    prev_index: 1,
                    txid: "t1".to_string(),
                    address: "mine".to_string(),
                    value: Amount::from_sat(7_200),
                },
            ],
            outputs: vec![mine, change, theirs],
            mempool_ts: None,
        }
    }

    #[test]
    fn test_plan_filters_untracked() {
        let tracked = ["mine", "change"];
        let plan = plan_ingestion(&record(0), 120, 1, |a| tracked.contains(&a));

        assert_eq!(plan.state, TxState::Mempool);
        let ids: Vec<String> = plan.updates.iter().map(LedgerUpdate::point_id).collect();
        assert_eq!(ids, vec!["t1:0", "t1:1", "p:0", "p:1", "t1"]);
        assert_eq!(plan.updates[4].amount(), Amount::from_sat(200));
        assert_eq!(plan.updates[4].direction(), None);
    }

    #[test]
    fn test_plan_at_new_height_keeps_points() {
        let tracked = |a: &str| a == "mine";
        let first = plan_ingestion(&record(0), 120, 1, tracked);
        let later = plan_ingestion(&record(120), 120, 1, tracked);

        assert_eq!(later.state, TxState::Pending);
        let ids = |p: &IngestPlan| p.updates.iter().map(LedgerUpdate::point_id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&later));
        match &later.updates[0] {
            LedgerUpdate::Received(utxo) => assert_eq!(utxo.height, 120),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn test_plan_no_fee_without_tracked_inputs() {
        let plan = plan_ingestion(&record(50), 120, 1, |a| a == "change");
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].direction(), Some(Direction::Out));
    }
}
