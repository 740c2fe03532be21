//! Gap limit tracking for HD address discovery
//!
//! Each branch keeps a [`SyncState`]: the last path inspected, the number of
//! consecutive addresses without history, and the highest index that had
//! history. Scanning a branch stops once the gap reaches the limit.

use core::cmp;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::derivation::{Branch, HdPath};

/// Standard gap limit (BIP44 recommendation).
pub const DEFAULT_GAP_LIMIT: u32 = 20;

/// Maximum gap limit to prevent excessive address generation
pub const MAX_GAP_LIMIT: u32 = 1000;

/// Gap limit value, capped at [`MAX_GAP_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GapLimit {
    limit: u32,
}

impl GapLimit {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: cmp::min(limit, MAX_GAP_LIMIT),
        }
    }

    pub fn value(&self) -> u32 {
        self.limit
    }

    pub fn is_reached(&self, state: &SyncState) -> bool {
        state.gap >= self.limit
    }
}

impl Default for GapLimit {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_LIMIT)
    }
}

/// Persisted scan progress of one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncState {
    pub branch: Branch,
    /// Last path inspected. `None` before the first scan.
    pub path: Option<HdPath>,
    /// Consecutive inspected paths without history.
    pub gap: u32,
    /// Highest index that had history.
    pub gap_end: Option<u32>,
}

impl SyncState {
    pub fn new(branch: Branch) -> Self {
        Self {
            branch,
            path: None,
            gap: 0,
            gap_end: None,
        }
    }

    /// Record the outcome of inspecting `path`.
    pub fn record(&mut self, path: &HdPath, has_tx: bool) {
        if has_tx {
            self.gap = 0;
            self.gap_end = Some(match self.gap_end {
                Some(end) => cmp::max(end, path.index()),
                None => path.index(),
            });
        } else {
            self.gap = self.gap.saturating_add(1);
        }
        self.path = Some(path.clone());
    }

    /// First path of the next pass, adjusting the counters for it.
    ///
    /// An interrupted pass (gap below the limit) continues after the last
    /// inspected path. A finished pass rescans from just past the highest
    /// used index with the gap reset. `None` means start from the branch's
    /// initial path.
    pub fn resume_path(&mut self, limit: GapLimit) -> Option<HdPath> {
        let last = self.path.clone()?;
        if !limit.is_reached(self) {
            return last.bump_index().ok();
        }
        let start = self.gap_end.map_or(0, |end| end.saturating_add(1));
        self.gap = 0;
        Some(last.with_index(start))
    }
}
