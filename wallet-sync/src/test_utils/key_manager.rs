use wallet_ledger::{AddressType, Branch, HdPath};

use crate::error::{Result, ValidationError};
use crate::key_manager::{DerivedAddress, KeyManager};

/// Deterministic key manager deriving readable fake addresses.
///
/// The address at `m/84'/1'/a'/c/i` is `bcrt1q{a}{r|c}{i}`, and its script
/// hash is the hex encoding of the address.
#[derive(Debug, Default)]
pub struct MockKeyManager {
    _private: (),
}

impl MockKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn address_for(account: u32, branch: Branch, index: u32) -> String {
        let tag = match branch {
            Branch::External => 'r',
            Branch::Internal => 'c',
        };
        format!("bcrt1q{}{}{}", account, tag, index)
    }

    /// Address of account 0 at `index` on `branch`.
    pub fn address_at(branch: Branch, index: u32) -> String {
        Self::address_for(0, branch, index)
    }

    pub fn script_hash_at(branch: Branch, index: u32) -> String {
        hex::encode(Self::address_at(branch, index))
    }
}

impl KeyManager for MockKeyManager {
    fn path_to_script_hash(
        &self,
        path: &HdPath,
        address_type: AddressType,
    ) -> Result<(String, DerivedAddress)> {
        if address_type != AddressType::P2wpkh {
            return Err(ValidationError::UnsupportedAddressType(address_type.to_string()).into());
        }
        let branch = path.branch().unwrap_or(Branch::External);
        let address = Self::address_for(path.account_index().account, branch, path.index());
        let derived = DerivedAddress {
            public_key: format!("02{}", hex::encode(path.to_string())),
            address: address.clone(),
            path: path.clone(),
        };
        Ok((hex::encode(address), derived))
    }
}
