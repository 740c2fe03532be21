//! Fee rates
//!
//! Rates are expressed in base units per virtual byte, the unit fee oracles
//! quote and the unit transaction weight is reported in.

use core::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Fee rate in satoshis per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct FeeRate {
    sat_per_vb: u64,
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::min()
    }
}

impl FeeRate {
    pub const fn new(sat_per_vb: u64) -> Self {
        Self {
            sat_per_vb,
        }
    }

    /// Create from satoshis per 1000 virtual bytes, rounding up.
    pub fn from_sat_per_kvb(sat_per_kvb: u64) -> Self {
        Self::new(sat_per_kvb.div_ceil(1000))
    }

    pub fn as_sat_per_vb(&self) -> u64 {
        self.sat_per_vb
    }

    pub fn is_zero(&self) -> bool {
        self.sat_per_vb == 0
    }

    /// Fee for a transaction of `vsize` virtual bytes.
    pub fn calculate_fee(&self, vsize: usize) -> Amount {
        Amount::from_sat((self.sat_per_vb as i64).saturating_mul(vsize as i64))
    }

    /// Default minimum fee rate (1 sat/vB)
    pub const fn min() -> Self {
        Self::new(1)
    }
}

impl Display for FeeRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} sat/vB", self.sat_per_vb)
    }
}
