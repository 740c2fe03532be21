//! Key derivation interface.

use serde::{Deserialize, Serialize};
use wallet_ledger::{AddressType, HdPath};

use crate::error::Result;

/// An address derived from the wallet's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub address: String,
    /// Hex encoded public key.
    pub public_key: String,
    pub path: HdPath,
}

/// Derives addresses and script hashes from HD paths.
///
/// Private key material stays behind this trait.
pub trait KeyManager: Send + Sync {
    /// Script hash used to query the provider, and the derived address.
    fn path_to_script_hash(
        &self,
        path: &HdPath,
        address_type: AddressType,
    ) -> Result<(String, DerivedAddress)>;
}
