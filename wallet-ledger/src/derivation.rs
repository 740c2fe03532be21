//! HD path algebra and sequential path scanning
//!
//! Paths follow BIP44/BIP84 layout: `m / purpose' / coin_type' / account' / change / index`.
//! All transforms are pure and return new paths.

use alloc::collections::VecDeque;
use core::fmt::{self, Display, Formatter};
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Purpose level for native segwit (BIP84) paths.
pub const PURPOSE_P2WPKH: u32 = 84;

/// Purpose level for legacy (BIP44) paths.
pub const PURPOSE_P2PKH: u32 = 44;

/// Canonical first receive path on mainnet.
pub const INIT_EXTERNAL_PATH: &str = "m/84'/0'/0'/0/0";

/// Canonical first change path on mainnet.
pub const INIT_INTERNAL_PATH: &str = "m/84'/0'/0'/1/0";

const PATH_SEGMENTS: usize = 6;

/// Script type derived from a path's purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum AddressType {
    P2wpkh,
    /// Reserved. Paths map to it but the sync core only derives P2WPKH.
    P2pkh,
}

impl AddressType {
    pub fn purpose(&self) -> u32 {
        match self {
            AddressType::P2wpkh => PURPOSE_P2WPKH,
            AddressType::P2pkh => PURPOSE_P2PKH,
        }
    }
}

impl Display for AddressType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::P2wpkh => f.write_str("p2wpkh"),
            AddressType::P2pkh => f.write_str("p2pkh"),
        }
    }
}

/// Chain branch of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Branch {
    /// Receive addresses, change level 0.
    External,
    /// Change addresses, change level 1.
    Internal,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::External, Branch::Internal];

    pub fn change_index(&self) -> u32 {
        match self {
            Branch::External => 0,
            Branch::Internal => 1,
        }
    }

    pub fn from_change_index(change: u32) -> Option<Branch> {
        match change {
            0 => Some(Branch::External),
            1 => Some(Branch::Internal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::External => "external",
            Branch::Internal => "internal",
        }
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path level with its hardened flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathSegment {
    pub index: u32,
    pub hardened: bool,
}

impl PathSegment {
    pub const fn hardened(index: u32) -> Self {
        Self {
            index,
            hardened: true,
        }
    }

    pub const fn normal(index: u32) -> Self {
        Self {
            index,
            hardened: false,
        }
    }

    fn parse(path: &str, segment: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidSegment {
            path: path.to_string(),
            segment: segment.to_string(),
        };
        let (digits, hardened) = match segment.strip_suffix('\'').or_else(|| segment.strip_suffix('h')) {
            Some(digits) => (digits, true),
            None => (segment, false),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let index = digits.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            index,
            hardened,
        })
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A parsed six-level HD path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct HdPath {
    purpose: PathSegment,
    coin_type: PathSegment,
    account: PathSegment,
    change: u32,
    index: u32,
}

impl HdPath {
    /// Build a path with hardened purpose, coin type and account levels.
    pub fn new(purpose: u32, coin_type: u32, account: u32, branch: Branch, index: u32) -> Self {
        Self {
            purpose: PathSegment::hardened(purpose),
            coin_type: PathSegment::hardened(coin_type),
            account: PathSegment::hardened(account),
            change: branch.change_index(),
            index,
        }
    }

    /// First BIP84 path of account 0 for a branch.
    pub fn initial(branch: Branch, coin_type: u32) -> Self {
        Self::new(PURPOSE_P2WPKH, coin_type, 0, branch, 0)
    }

    /// Parse `m/purpose'/coin'/account'/change/index`.
    pub fn parse_path(path: &str) -> Result<Self, PathError> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != PATH_SEGMENTS {
            return Err(PathError::SegmentCount {
                path: path.to_string(),
                found: parts.len(),
            });
        }
        if parts[0] != "m" {
            return Err(PathError::InvalidSegment {
                path: path.to_string(),
                segment: parts[0].to_string(),
            });
        }
        let change = PathSegment::parse(path, parts[4])?;
        let index = PathSegment::parse(path, parts[5])?;
        if change.hardened || index.hardened {
            let segment = if change.hardened {
                parts[4]
            } else {
                parts[5]
            };
            return Err(PathError::InvalidSegment {
                path: path.to_string(),
                segment: segment.to_string(),
            });
        }
        Ok(Self {
            purpose: PathSegment::parse(path, parts[1])?,
            coin_type: PathSegment::parse(path, parts[2])?,
            account: PathSegment::parse(path, parts[3])?,
            change: change.index,
            index: index.index,
        })
    }

    /// Render back to the string form.
    pub fn merge_path(&self) -> String {
        self.to_string()
    }

    pub fn purpose(&self) -> PathSegment {
        self.purpose
    }

    pub fn coin_type(&self) -> PathSegment {
        self.coin_type
    }

    pub fn account(&self) -> PathSegment {
        self.account
    }

    pub fn change(&self) -> u32 {
        self.change
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// `None` when the change level is neither 0 nor 1.
    pub fn branch(&self) -> Option<Branch> {
        Branch::from_change_index(self.change)
    }

    pub fn account_index(&self) -> AccountIndex {
        AccountIndex {
            purpose: self.purpose.index,
            account: self.account.index,
        }
    }

    pub fn set_purpose(&self, purpose: u32) -> Self {
        Self {
            purpose: PathSegment::hardened(purpose),
            ..self.clone()
        }
    }

    pub fn set_account(&self, account: u32) -> Self {
        Self {
            account: PathSegment::hardened(account),
            ..self.clone()
        }
    }

    pub fn bump_account(&self) -> Result<Self, PathError> {
        let account = self
            .account
            .index
            .checked_add(1)
            .ok_or_else(|| PathError::IndexOverflow(self.to_string()))?;
        Ok(self.set_account(account))
    }

    /// Next address index on the same branch.
    pub fn bump_index(&self) -> Result<Self, PathError> {
        let index =
            self.index.checked_add(1).ok_or_else(|| PathError::IndexOverflow(self.to_string()))?;
        Ok(self.with_index(index))
    }

    /// Move to the internal branch at `index`.
    pub fn set_change_index(&self, index: u32) -> Self {
        Self {
            change: Branch::Internal.change_index(),
            index,
            ..self.clone()
        }
    }

    pub fn with_branch(&self, branch: Branch) -> Self {
        Self {
            change: branch.change_index(),
            ..self.clone()
        }
    }

    pub fn with_index(&self, index: u32) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Script type implied by the purpose level.
    pub fn address_type(&self) -> Result<AddressType, PathError> {
        match (self.purpose.index, self.purpose.hardened) {
            (PURPOSE_P2WPKH, true) => Ok(AddressType::P2wpkh),
            (PURPOSE_P2PKH, true) => Ok(AddressType::P2pkh),
            _ => Err(PathError::UnsupportedPurpose(self.purpose.to_string())),
        }
    }
}

impl Display for HdPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{}/{}/{}/{}/{}",
            self.purpose, self.coin_type, self.account, self.change, self.index
        )
    }
}

impl FromStr for HdPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_path(s)
    }
}

impl TryFrom<String> for HdPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_path(&value)
    }
}

impl From<HdPath> for String {
    fn from(path: HdPath) -> Self {
        path.to_string()
    }
}

/// An account known to the wallet, identified by purpose and account level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccountIndex {
    pub purpose: u32,
    pub account: u32,
}

impl AccountIndex {
    pub fn first_path(&self, coin_type: u32, branch: Branch) -> HdPath {
        HdPath::new(self.purpose, coin_type, self.account, branch, 0)
    }

    fn matches(&self, path: &HdPath) -> bool {
        path.purpose.index == self.purpose && path.account.index == self.account
    }
}

impl Default for AccountIndex {
    fn default() -> Self {
        Self {
            purpose: PURPOSE_P2WPKH,
            account: 0,
        }
    }
}

/// Hands out the paths of one branch, one at a time, across every known
/// account.
///
/// The caller inspects each path and decides whether to continue: [`halt`]
/// ends the current account (the next call moves to the following one) and
/// [`stop`] ends the whole scan. Indices within an account are strictly
/// increasing and never repeat.
///
/// [`halt`]: PathScanner::halt
/// [`stop`]: PathScanner::stop
#[derive(Debug, Clone)]
pub struct PathScanner {
    branch: Branch,
    coin_type: u32,
    accounts: VecDeque<AccountIndex>,
    resume: Option<HdPath>,
    next: Option<HdPath>,
}

impl PathScanner {
    /// Create a scanner. `start` is the first path to yield when resuming a
    /// previous pass; accounts listed before its account are skipped.
    pub fn new(
        branch: Branch,
        coin_type: u32,
        accounts: &[AccountIndex],
        start: Option<HdPath>,
    ) -> Self {
        let mut accounts: VecDeque<AccountIndex> = accounts.iter().copied().collect();
        let resume = match start {
            Some(path) => match accounts.iter().position(|a| a.matches(&path)) {
                Some(pos) => {
                    accounts.drain(..pos);
                    Some(path.with_branch(branch))
                }
                None => {
                    tracing::warn!("Resume path {} does not belong to a known account", path);
                    None
                }
            },
            None => None,
        };
        Self {
            branch,
            coin_type,
            accounts,
            resume,
            next: None,
        }
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    /// Next path to inspect, or `None` once every account is done.
    pub fn next_path(&mut self) -> Option<HdPath> {
        if self.next.is_none() {
            let account = self.accounts.pop_front()?;
            let first = match self.resume.take() {
                Some(path) => path,
                None => account.first_path(self.coin_type, self.branch),
            };
            self.next = Some(first);
        }
        let path = self.next.take()?;
        self.next = path.bump_index().ok();
        Some(path)
    }

    /// Finish the current account.
    pub fn halt(&mut self) {
        self.next = None;
    }

    /// Finish the scan.
    pub fn stop(&mut self) {
        self.next = None;
        self.resume = None;
        self.accounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("m/84'/0'/0'/0/0" ; "external")]
    #[test_case("m/84'/1'/3'/1/17" ; "internal testnet")]
    #[test_case("m/44'/0'/0'/0/5" ; "legacy")]
    fn test_parse_merge_round_trip(path: &str) {
        let parsed = HdPath::parse_path(path).unwrap();
        assert_eq!(parsed.merge_path(), path);
        assert_eq!(HdPath::parse_path(&parsed.merge_path()).unwrap(), parsed);
    }

    #[test_case("m/84'/0'/0'/0", 5 ; "too short")]
    #[test_case("m/84'/0'/0'/0/0/1", 7 ; "too long")]
    fn test_parse_segment_count(path: &str, found: usize) {
        assert_eq!(
            HdPath::parse_path(path),
            Err(PathError::SegmentCount {
                path: path.to_string(),
                found,
            })
        );
    }

    #[test_case("x/84'/0'/0'/0/0" ; "bad root")]
    #[test_case("m/84'/0'/zero'/0/0" ; "bad account")]
    #[test_case("m/84'/0'/0'/0/1'" ; "hardened index")]
    fn test_parse_invalid_segment(path: &str) {
        assert!(matches!(HdPath::parse_path(path), Err(PathError::InvalidSegment { .. })));
    }

    #[test]
    fn test_path_algebra() {
        let path = HdPath::parse_path(INIT_EXTERNAL_PATH).unwrap();
        assert_eq!(path.set_purpose(44).to_string(), "m/44'/0'/0'/0/0");
        assert_eq!(path.set_account(2).to_string(), "m/84'/0'/2'/0/0");
        assert_eq!(path.bump_account().unwrap().to_string(), "m/84'/0'/1'/0/0");
        assert_eq!(path.bump_index().unwrap().to_string(), "m/84'/0'/0'/0/1");
        assert_eq!(path.set_change_index(9).to_string(), "m/84'/0'/0'/1/9");
        assert_eq!(path.with_branch(Branch::Internal).to_string(), INIT_INTERNAL_PATH);
        assert_eq!(HdPath::initial(Branch::Internal, 0).to_string(), INIT_INTERNAL_PATH);
        assert!(path.with_index(u32::MAX).bump_index().is_err());
    }

    #[test]
    fn test_address_type() {
        let path = HdPath::parse_path(INIT_EXTERNAL_PATH).unwrap();
        assert_eq!(path.address_type(), Ok(AddressType::P2wpkh));
        assert_eq!(path.set_purpose(44).address_type(), Ok(AddressType::P2pkh));
        assert!(matches!(
            path.set_purpose(49).address_type(),
            Err(PathError::UnsupportedPurpose(_))
        ));
    }

    #[test]
    fn test_scanner_monotonic_indices() {
        let mut scanner =
            PathScanner::new(Branch::External, 1, &[AccountIndex::default()], None);
        for expected in 0..25 {
            let path = scanner.next_path().unwrap();
            assert_eq!(path.index(), expected);
            assert_eq!(path.purpose(), PathSegment::hardened(84));
            assert_eq!(path.coin_type(), PathSegment::hardened(1));
            assert_eq!(path.account(), PathSegment::hardened(0));
            assert_eq!(path.branch(), Some(Branch::External));
        }
    }

    #[test]
    fn test_scanner_halt_moves_to_next_account() {
        let accounts = [
            AccountIndex::default(),
            AccountIndex {
                purpose: 84,
                account: 1,
            },
        ];
        let mut scanner = PathScanner::new(Branch::Internal, 0, &accounts, None);
        assert_eq!(scanner.next_path().unwrap().to_string(), "m/84'/0'/0'/1/0");
        assert_eq!(scanner.next_path().unwrap().to_string(), "m/84'/0'/0'/1/1");
        scanner.halt();
        assert_eq!(scanner.next_path().unwrap().to_string(), "m/84'/0'/1'/1/0");
        scanner.stop();
        assert!(scanner.next_path().is_none());
    }

    #[test]
    fn test_scanner_resume() {
        let accounts = [
            AccountIndex::default(),
            AccountIndex {
                purpose: 84,
                account: 1,
            },
        ];
        let start = HdPath::parse_path("m/84'/0'/1'/0/7").unwrap();
        let mut scanner = PathScanner::new(Branch::External, 0, &accounts, Some(start));
        assert_eq!(scanner.next_path().unwrap().index(), 7);
        assert_eq!(scanner.next_path().unwrap().index(), 8);
        scanner.halt();
        assert!(scanner.next_path().is_none());
    }

    #[test]
    fn test_path_serde_as_string() {
        let path = HdPath::parse_path("m/84'/1'/0'/1/3").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"m/84'/1'/0'/1/3\"");
        let back: HdPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<HdPath>("\"m/84'\"").is_err());
    }
}
