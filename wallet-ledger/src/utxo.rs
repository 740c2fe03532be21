//! UTXO management for wallet operations
//!
//! [`UtxoSet`] keeps every observed spendable output (vout) and every
//! observed spend of one (vin). Processing prunes spent outputs and makes the
//! set ready for selection. A selection holds an exclusive lease on the set
//! until it is released with [`UtxoSet::unlock`].

use alloc::collections::BTreeSet;
use core::fmt::{self, Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::coin_selection::{self, SelectionError, SelectionResult};
use crate::derivation::HdPath;

/// Reference to a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutPoint {
    pub txid: String,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl Display for OutPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// Unspent Transaction Output
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Utxo {
    pub txid: String,
    pub index: u32,
    /// The address this UTXO pays to
    pub address: String,
    pub value: Amount,
    /// Hex encoded output script
    pub witness_script: String,
    /// Hex encoded public key of the receiving address, set on ingestion
    #[cfg_attr(feature = "serde", serde(default))]
    pub address_public_key: Option<String>,
    /// Derivation path of the receiving address, set on ingestion
    #[cfg_attr(feature = "serde", serde(default))]
    pub address_path: Option<HdPath>,
    /// Block height where this UTXO was created, 0 while in the mempool
    #[cfg_attr(feature = "serde", serde(default))]
    pub height: u32,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.index)
    }

    /// Ledger point id, `txid:index`.
    pub fn point_id(&self) -> String {
        self.outpoint().to_string()
    }

    /// Whether signing metadata has been attached.
    pub fn is_signable(&self) -> bool {
        self.address_public_key.is_some() && self.address_path.is_some()
    }
}

/// An observed transaction input spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpentOutput {
    pub prev_txid: String,
    pub prev_index: u32,
    /// Spending transaction
    pub txid: String,
    /// Address of the spent output
    pub address: String,
    /// Value of the spent output
    pub value: Amount,
}

impl SpentOutput {
    pub fn spends(&self) -> OutPoint {
        OutPoint::new(self.prev_txid.clone(), self.prev_index)
    }

    /// Ledger point id, `prev_txid:prev_index`.
    pub fn point_id(&self) -> String {
        self.spends().to_string()
    }
}

/// UTXO set with lock-based selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UtxoSet {
    vin: Vec<SpentOutput>,
    vout: Vec<Utxo>,
    /// Outputs spent by our own broadcasts, never offered again.
    committed: BTreeSet<OutPoint>,
    #[cfg_attr(feature = "serde", serde(skip))]
    locked: BTreeSet<OutPoint>,
    #[cfg_attr(feature = "serde", serde(skip))]
    ready: bool,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from persisted parts. Call [`process`](Self::process)
    /// before selecting.
    pub fn from_parts(
        vin: Vec<SpentOutput>,
        vout: Vec<Utxo>,
        committed: impl IntoIterator<Item = OutPoint>,
    ) -> Self {
        let committed: BTreeSet<OutPoint> = committed.into_iter().collect();
        let vout = vout.into_iter().filter(|u| !committed.contains(&u.outpoint())).collect();
        Self {
            vin,
            vout,
            committed,
            locked: BTreeSet::new(),
            ready: false,
        }
    }

    /// Record an observed output. Returns `false` if it was already known or
    /// already spent by us.
    pub fn add_output(&mut self, utxo: Utxo) -> bool {
        let outpoint = utxo.outpoint();
        if self.committed.contains(&outpoint) {
            return false;
        }
        match self.vout.iter_mut().find(|u| u.outpoint() == outpoint) {
            Some(existing) => {
                // Keep the freshest height and signing data.
                existing.height = utxo.height;
                if utxo.is_signable() {
                    existing.address_public_key = utxo.address_public_key;
                    existing.address_path = utxo.address_path;
                }
                false
            }
            None => {
                self.vout.push(utxo);
                true
            }
        }
    }

    /// Record an observed spend. Returns `false` if it was already known.
    pub fn add_input(&mut self, spent: SpentOutput) -> bool {
        if self.vin.iter().any(|s| s.spends() == spent.spends()) {
            return false;
        }
        self.vin.push(spent);
        true
    }

    /// Drop outputs that have a matching spend, sort the rest ascending by
    /// value and mark the set ready. A selection in flight keeps its lease.
    pub fn process(&mut self) {
        let spent: BTreeSet<OutPoint> = self.vin.iter().map(SpentOutput::spends).collect();
        let before = self.vout.len();
        self.vout.retain(|u| !spent.contains(&u.outpoint()));
        self.sort();
        self.ready = self.locked.is_empty();
        tracing::debug!(
            "Processed UTXO set: {} spendable, {} pruned, {} spends",
            self.vout.len(),
            before - self.vout.len(),
            self.vin.len()
        );
    }

    fn sort(&mut self) {
        self.vout.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.outpoint().cmp(&b.outpoint())));
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Spendable outputs, ascending by value after [`process`](Self::process).
    pub fn utxos(&self) -> &[Utxo] {
        &self.vout
    }

    pub fn spends(&self) -> &[SpentOutput] {
        &self.vin
    }

    pub fn committed(&self) -> impl Iterator<Item = &OutPoint> {
        self.committed.iter()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.vout.iter().find(|u| &u.outpoint() == outpoint)
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.locked.contains(outpoint)
    }

    pub fn locked(&self) -> impl Iterator<Item = &OutPoint> {
        self.locked.iter()
    }

    /// Total of unlocked outputs.
    pub fn available(&self) -> Amount {
        self.vout.iter().filter(|u| !self.locked.contains(&u.outpoint())).map(|u| u.value).sum()
    }

    /// Lock a known output. Returns whether the lock was newly acquired.
    pub fn lock(&mut self, outpoint: &OutPoint) -> bool {
        if self.locked.contains(outpoint) || self.get(outpoint).is_none() {
            return false;
        }
        self.locked.insert(outpoint.clone())
    }

    /// Select outputs smallest first until `target` is covered, locking each
    /// one taken. The set stays not-ready until [`unlock`](Self::unlock).
    pub fn get_utxo_for_amount(&mut self, target: Amount) -> Result<SelectionResult, SelectionError> {
        if !self.ready {
            return Err(SelectionError::NotReady);
        }

        let mut candidates: Vec<&Utxo> =
            self.vout.iter().filter(|u| !self.locked.contains(&u.outpoint())).collect();
        if candidates.is_empty() {
            return Err(SelectionError::NoUtxosAvailable);
        }
        candidates.sort_by_key(|u| u.value);

        match coin_selection::accumulate(candidates, target) {
            Ok(result) => {
                for utxo in &result.selected {
                    self.locked.insert(utxo.outpoint());
                }
                self.ready = false;
                tracing::debug!(
                    "Selected {} UTXOs totalling {} for target {}",
                    result.selected.len(),
                    result.total.to_sat(),
                    target.to_sat()
                );
                Ok(result)
            }
            Err(available) => Err(SelectionError::InsufficientFunds {
                available,
                required: target,
            }),
        }
    }

    /// Release the selection lease.
    ///
    /// With `success` the locked outputs are spent: they leave the set for
    /// good. Otherwise they go back to the pool.
    pub fn unlock(&mut self, success: bool) {
        if success {
            let locked = core::mem::take(&mut self.locked);
            self.vout.retain(|u| !locked.contains(&u.outpoint()));
            self.committed.extend(locked);
        } else {
            self.locked.clear();
        }
        self.sort();
        self.ready = true;
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
pub(crate) fn test_utxo(txid: &str, index: u32, value: i64) -> Utxo {
    Utxo {
        txid: txid.to_string(),
        index,
        address: format!("bcrt1q{}", txid),
        value: Amount::from_sat(value),
        witness_script: "0014".to_string(),
        address_public_key: None,
        address_path: None,
        height: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(prev_txid: &str, prev_index: u32) -> SpentOutput {
        SpentOutput {
            prev_txid: prev_txid.to_string(),
            prev_index,
            txid: "spender".to_string(),
            address: format!("bcrt1q{}", prev_txid),
            value: Amount::from_sat(1),
        }
    }

    fn ready_set(values: &[i64]) -> UtxoSet {
        let mut set = UtxoSet::new();
        for (i, value) in values.iter().enumerate() {
            set.add_output(test_utxo(&format!("tx{}", i), 0, *value));
        }
        set.process();
        set
    }

    #[test]
    fn test_process_prunes_spent_outputs() {
        let mut set = UtxoSet::new();
        set.add_output(test_utxo("A", 0, 1_000));
        set.add_output(test_utxo("A", 1, 2_000));
        set.add_input(spend("A", 0));
        assert!(!set.is_ready());

        set.process();
        assert!(set.is_ready());
        assert!(set.get(&OutPoint::new("A", 0)).is_none());
        assert!(set.get(&OutPoint::new("A", 1)).is_some());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = UtxoSet::new();
        assert!(set.add_output(test_utxo("A", 0, 1_000)));
        assert!(!set.add_output(test_utxo("A", 0, 1_000)));
        assert!(set.add_input(spend("B", 0)));
        assert!(!set.add_input(spend("B", 0)));
        assert_eq!(set.utxos().len(), 1);
        assert_eq!(set.spends().len(), 1);
    }

    #[test]
    fn test_selection_smallest_first() {
        let mut set = ready_set(&[30_000, 10_000, 20_000]);
        let result = set.get_utxo_for_amount(Amount::from_sat(25_000)).unwrap();

        let values: Vec<i64> = result.selected.iter().map(|u| u.value.to_sat()).collect();
        assert_eq!(values, vec![10_000, 20_000]);
        assert_eq!(result.total, Amount::from_sat(30_000));
        assert_eq!(result.difference, Amount::from_sat(5_000));
        assert!(result.selected.iter().all(|u| set.is_locked(&u.outpoint())));
    }

    #[test]
    fn test_second_selection_without_unlock_fails() {
        let mut set = ready_set(&[10_000, 20_000]);
        set.get_utxo_for_amount(Amount::from_sat(5_000)).unwrap();
        assert_eq!(set.get_utxo_for_amount(Amount::from_sat(5_000)), Err(SelectionError::NotReady));
    }

    #[test]
    fn test_insufficient_funds_releases_lease() {
        let mut set = ready_set(&[10_000, 20_000]);
        assert_eq!(
            set.get_utxo_for_amount(Amount::from_sat(40_000)),
            Err(SelectionError::InsufficientFunds {
                available: Amount::from_sat(30_000),
                required: Amount::from_sat(40_000),
            })
        );
        assert!(set.is_ready());
        assert_eq!(set.locked().count(), 0);
    }

    #[test]
    fn test_no_utxos() {
        let mut set = ready_set(&[]);
        assert_eq!(set.get_utxo_for_amount(Amount::from_sat(1)), Err(SelectionError::NoUtxosAvailable));
    }

    #[test]
    fn test_unlock_failure_returns_outputs() {
        let mut set = ready_set(&[10_000, 20_000]);
        set.get_utxo_for_amount(Amount::from_sat(15_000)).unwrap();
        set.unlock(false);
        assert!(set.is_ready());
        assert_eq!(set.utxos().len(), 2);
        assert_eq!(set.available(), Amount::from_sat(30_000));
    }

    #[test]
    fn test_unlock_success_spends_outputs() {
        let mut set = ready_set(&[10_000, 20_000]);
        set.get_utxo_for_amount(Amount::from_sat(5_000)).unwrap();
        set.unlock(true);
        assert!(set.is_ready());
        assert_eq!(set.utxos().len(), 1);

        // Re-observing the funding transaction must not resurrect the output.
        assert!(!set.add_output(test_utxo("tx0", 0, 10_000)));
    }

    #[test]
    fn test_lock() {
        let mut set = ready_set(&[10_000]);
        let outpoint = OutPoint::new("tx0", 0);
        assert!(set.lock(&outpoint));
        assert!(!set.lock(&outpoint));
        assert!(!set.lock(&OutPoint::new("unknown", 0)));
    }

    #[test]
    fn test_process_during_selection_keeps_lease() {
        let mut set = ready_set(&[10_000, 20_000]);
        set.get_utxo_for_amount(Amount::from_sat(5_000)).unwrap();
        set.add_output(test_utxo("late", 0, 1_000));
        set.process();
        assert!(!set.is_ready());
    }

    #[test]
    fn test_point_ids() {
        assert_eq!(test_utxo("abc", 2, 1).point_id(), "abc:2");
        assert_eq!(spend("def", 7).point_id(), "def:7");
    }
}
