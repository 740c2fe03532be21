//! Per-state balance ledger
//!
//! A [`BalanceEntry`] splits a balance into confirmed, pending and mempool
//! buckets. Each bucket keeps the list of points (outputs or spent inputs)
//! that contributed to it, and the bucket balance always equals the sum of
//! its points.

use core::fmt::{Display, Formatter};
use core::ops::AddAssign;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Confirmation state of a transaction contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum TxState {
    /// Buried under at least the configured number of confirmations.
    Confirmed,
    /// Mined but not yet buried deep enough.
    Pending,
    /// Not yet mined.
    Mempool,
}

impl TxState {
    pub const ALL: [TxState; 3] = [TxState::Confirmed, TxState::Pending, TxState::Mempool];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Confirmed => "confirmed",
            TxState::Pending => "pending",
            TxState::Mempool => "mempool",
        }
    }
}

impl Display for TxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contribution to a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// `txid:index` for outputs, `prev_txid:prev_index` for spent inputs.
    pub id: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Bucket {
    balance: Amount,
    points: Vec<Point>,
}

impl Bucket {
    fn position(&self, id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }
}

/// Three-way split balance with the points backing each state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BalanceEntry {
    confirmed: Bucket,
    pending: Bucket,
    mempool: Bucket,
}

impl BalanceEntry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, state: TxState) -> &Bucket {
        match state {
            TxState::Confirmed => &self.confirmed,
            TxState::Pending => &self.pending,
            TxState::Mempool => &self.mempool,
        }
    }

    fn bucket_mut(&mut self, state: TxState) -> &mut Bucket {
        match state {
            TxState::Confirmed => &mut self.confirmed,
            TxState::Pending => &mut self.pending,
            TxState::Mempool => &mut self.mempool,
        }
    }

    /// Balance of one state.
    pub fn balance(&self, state: TxState) -> Amount {
        self.bucket(state).balance
    }

    /// Points currently recorded under one state.
    pub fn points(&self, state: TxState) -> &[Point] {
        &self.bucket(state).points
    }

    pub fn confirmed(&self) -> Amount {
        self.confirmed.balance
    }

    pub fn pending(&self) -> Amount {
        self.pending.balance
    }

    pub fn mempool(&self) -> Amount {
        self.mempool.balance
    }

    /// Sum of all three states.
    pub fn total(&self) -> Amount {
        self.confirmed.balance + self.pending.balance + self.mempool.balance
    }

    /// Look up a point in a specific state.
    pub fn get_point(&self, state: TxState, id: &str) -> Option<&Point> {
        let bucket = self.bucket(state);
        bucket.position(id).map(|i| &bucket.points[i])
    }

    /// Find which state currently holds a point.
    pub fn find_point(&self, id: &str) -> Option<(TxState, &Point)> {
        TxState::ALL.into_iter().find_map(|state| self.get_point(state, id).map(|p| (state, p)))
    }

    /// Record `amount` for `id` under `state`.
    ///
    /// If the point already sits in `state` nothing changes. If it sits in
    /// another state it is moved: removed there (subtracting the amount
    /// recorded at that time) and added here with the new amount.
    ///
    /// Returns `true` if the entry changed.
    pub fn add_point(&mut self, state: TxState, id: &str, amount: Amount) -> bool {
        if self.bucket(state).position(id).is_some() {
            return false;
        }

        for other in TxState::ALL {
            if other == state {
                continue;
            }
            let bucket = self.bucket_mut(other);
            if let Some(pos) = bucket.position(id) {
                let previous = bucket.points.remove(pos);
                bucket.balance -= previous.amount;
            }
        }

        let bucket = self.bucket_mut(state);
        bucket.balance += amount;
        bucket.points.push(Point {
            id: id.to_string(),
            amount,
        });
        true
    }

    /// Whether every bucket balance equals the sum of its points.
    pub fn is_consistent(&self) -> bool {
        TxState::ALL.into_iter().all(|state| {
            let bucket = self.bucket(state);
            bucket.points.iter().map(|p| p.amount).sum::<Amount>() == bucket.balance
        })
    }

    /// Per-state difference `self - other` with a consolidated total.
    pub fn combine(&self, other: &BalanceEntry) -> BalanceSummary {
        BalanceSummary::new(
            self.confirmed() - other.confirmed(),
            self.pending() - other.pending(),
            self.mempool() - other.mempool(),
        )
    }

    /// Snapshot of this entry's balances.
    pub fn formatted(&self) -> BalanceSummary {
        BalanceSummary::new(self.confirmed(), self.pending(), self.mempool())
    }
}

/// Immutable view of a balance split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BalanceSummary {
    pub confirmed: Amount,
    pub pending: Amount,
    pub mempool: Amount,
    /// `confirmed + pending + mempool`
    pub consolidated: Amount,
}

impl BalanceSummary {
    pub fn new(confirmed: Amount, pending: Amount, mempool: Amount) -> Self {
        Self {
            confirmed,
            pending,
            mempool,
            consolidated: confirmed + pending + mempool,
        }
    }
}

impl Display for BalanceSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Confirmed: {}, Pending: {}, Mempool: {}, Consolidated: {}",
            self.confirmed, self.pending, self.mempool, self.consolidated
        )
    }
}

impl AddAssign for BalanceSummary {
    fn add_assign(&mut self, other: Self) {
        *self = Self::new(
            self.confirmed + other.confirmed,
            self.pending + other.pending,
            self.mempool + other.mempool,
        );
    }
}

/// Which side of a transaction a point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Direction {
    /// A spent input.
    In,
    /// A received output.
    Out,
}

/// Ledger of one address (or of the whole wallet).
///
/// `outputs` accumulates value received, `inputs` value spent and `fee` the
/// fees of transactions this address paid into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddressRecord {
    #[cfg_attr(feature = "serde", serde(rename = "in"))]
    pub inputs: BalanceEntry,
    #[cfg_attr(feature = "serde", serde(rename = "out"))]
    pub outputs: BalanceEntry,
    pub fee: BalanceEntry,
}

impl AddressRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, direction: Direction) -> &BalanceEntry {
        match direction {
            Direction::In => &self.inputs,
            Direction::Out => &self.outputs,
        }
    }

    pub fn entry_mut(&mut self, direction: Direction) -> &mut BalanceEntry {
        match direction {
            Direction::In => &mut self.inputs,
            Direction::Out => &mut self.outputs,
        }
    }

    /// Received minus spent.
    pub fn net(&self) -> BalanceSummary {
        self.outputs.combine(&self.inputs)
    }
}
