//! HD derivation state: fresh-address frontier, scan progress per branch
//! and the registry of every address derived so far.

use std::collections::HashMap;
use std::sync::Arc;

use wallet_ledger::{AccountIndex, AddressType, Branch, HdPath, SyncState};

use crate::error::{Result, StorageResult};
use crate::key_manager::{DerivedAddress, KeyManager};
use crate::storage::KeyValueStore;

const HD_NS: &str = "hdwallet";
const ACCOUNTS_KEY: &str = "account_index";
const ADDRESS_PREFIX: &str = "addr:";

fn current_path_key(branch: Branch) -> String {
    format!("current_{}_path", branch.as_str())
}

fn sync_state_key(branch: Branch) -> String {
    format!("sync_state_{}", branch.as_str())
}

async fn load_frontier(
    store: &dyn KeyValueStore,
    branch: Branch,
    coin_type: u32,
) -> StorageResult<HdPath> {
    let key = current_path_key(branch);
    if let Some(path) = store.get_json::<HdPath>(&key).await? {
        return Ok(path);
    }
    let path = HdPath::initial(branch, coin_type);
    store.put_json(&key, &path).await?;
    Ok(path)
}

pub struct HdWallet {
    store: Arc<dyn KeyValueStore>,
    coin_type: u32,
    accounts: Vec<AccountIndex>,
    external: HdPath,
    internal: HdPath,
    addresses: HashMap<String, DerivedAddress>,
}

impl HdWallet {
    /// Load persisted state, initializing anything missing.
    pub async fn init(store: &dyn KeyValueStore, coin_type: u32) -> StorageResult<Self> {
        let store = store.namespace(HD_NS)?;

        let accounts: Vec<AccountIndex> = match store.get_json(ACCOUNTS_KEY).await? {
            Some(accounts) => accounts,
            None => {
                let accounts = vec![AccountIndex::default()];
                store.put_json(ACCOUNTS_KEY, &accounts).await?;
                accounts
            }
        };

        let external = load_frontier(store.as_ref(), Branch::External, coin_type).await?;
        let internal = load_frontier(store.as_ref(), Branch::Internal, coin_type).await?;

        let addresses: HashMap<String, DerivedAddress> = store
            .scan_json::<DerivedAddress>(ADDRESS_PREFIX)
            .await?
            .into_iter()
            .map(|(_, derived)| (derived.address.clone(), derived))
            .collect();

        tracing::debug!(
            "HD wallet ready: external {}, internal {}, {} known addresses",
            external,
            internal,
            addresses.len()
        );

        Ok(Self {
            store,
            coin_type,
            accounts,
            external,
            internal,
            addresses,
        })
    }

    pub fn coin_type(&self) -> u32 {
        self.coin_type
    }

    pub fn accounts(&self) -> &[AccountIndex] {
        &self.accounts
    }

    /// Next unused path of a branch.
    pub fn current_path(&self, branch: Branch) -> &HdPath {
        match branch {
            Branch::External => &self.external,
            Branch::Internal => &self.internal,
        }
    }

    async fn set_current_path(&mut self, branch: Branch, path: HdPath) -> StorageResult<()> {
        self.store.put_json(&current_path_key(branch), &path).await?;
        match branch {
            Branch::External => self.external = path,
            Branch::Internal => self.internal = path,
        }
        Ok(())
    }

    /// Derive the address at the branch frontier and move the frontier on.
    pub async fn get_new_address<K: KeyManager + ?Sized>(
        &mut self,
        branch: Branch,
        key_manager: &K,
        address_type: AddressType,
    ) -> Result<(String, DerivedAddress)> {
        let path = self.current_path(branch).clone();
        let (script_hash, derived) = key_manager.path_to_script_hash(&path, address_type)?;
        self.add_address(derived.clone()).await?;
        self.set_current_path(branch, path.bump_index()?).await?;
        Ok((script_hash, derived))
    }

    /// Move the frontier beyond a path known to have history.
    pub async fn advance_past(&mut self, path: &HdPath) -> Result<()> {
        let Some(branch) = path.branch() else {
            return Ok(());
        };
        let current = self.current_path(branch);
        if current.account_index() != path.account_index() || current.index() > path.index() {
            return Ok(());
        }
        self.set_current_path(branch, path.bump_index()?).await?;
        Ok(())
    }

    pub async fn sync_state(&self, branch: Branch) -> StorageResult<SyncState> {
        Ok(self.store.get_json(&sync_state_key(branch)).await?.unwrap_or_else(|| SyncState::new(branch)))
    }

    pub async fn set_sync_state(&self, state: &SyncState) -> StorageResult<()> {
        self.store.put_json(&sync_state_key(state.branch), state).await
    }

    /// Forget scan progress. The frontiers stay where they are, so an index
    /// that was handed out is never handed out again.
    pub async fn reset_sync_state(&self) -> StorageResult<()> {
        for branch in Branch::ALL {
            self.store.delete(&sync_state_key(branch)).await?;
        }
        Ok(())
    }

    pub async fn add_address(&mut self, derived: DerivedAddress) -> StorageResult<()> {
        if self.addresses.get(&derived.address) == Some(&derived) {
            return Ok(());
        }
        self.store.put_json(&format!("{}{}", ADDRESS_PREFIX, derived.address), &derived).await?;
        self.addresses.insert(derived.address.clone(), derived);
        Ok(())
    }

    pub fn get_address(&self, address: &str) -> Option<&DerivedAddress> {
        self.addresses.get(address)
    }

    pub fn is_known(&self, address: &str) -> bool {
        self.addresses.contains_key(address)
    }

    /// Copy of the registry, for use without holding the wallet lock.
    pub fn known_addresses(&self) -> HashMap<String, DerivedAddress> {
        self.addresses.clone()
    }
}
