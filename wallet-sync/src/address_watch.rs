//! Provider subscriptions for recently used script hashes.
//!
//! Each branch keeps at most `max` watched script hashes together with the
//! last status the provider reported. Adding one past the cap drops the
//! oldest. A failed subscription is logged and never fails the caller.

use wallet_ledger::Branch;

use crate::error::StorageResult;
use crate::provider::ChainProvider;
use crate::state::{StateDb, WatchedScript};

pub struct AddressWatch {
    state: StateDb,
    max: usize,
    external: Vec<WatchedScript>,
    internal: Vec<WatchedScript>,
}

impl AddressWatch {
    pub async fn load(state: StateDb, max: usize) -> StorageResult<Self> {
        let external = state.watched_scripts(Branch::External).await?;
        let internal = state.watched_scripts(Branch::Internal).await?;
        Ok(Self {
            state,
            max,
            external,
            internal,
        })
    }

    fn list(&self, branch: Branch) -> &Vec<WatchedScript> {
        match branch {
            Branch::External => &self.external,
            Branch::Internal => &self.internal,
        }
    }

    fn list_mut(&mut self, branch: Branch) -> &mut Vec<WatchedScript> {
        match branch {
            Branch::External => &mut self.external,
            Branch::Internal => &mut self.internal,
        }
    }

    pub fn watched(&self, branch: Branch) -> &[WatchedScript] {
        self.list(branch)
    }

    /// Re-subscribe every stored script hash, refreshing its status.
    pub async fn start_watching<P: ChainProvider + ?Sized>(&mut self, provider: &P) -> StorageResult<()> {
        for branch in Branch::ALL {
            let mut changed = false;
            for entry in self.list_mut(branch).iter_mut() {
                match provider.subscribe_to_address(&entry.script_hash).await {
                    Ok(status) => {
                        changed |= entry.status != status;
                        entry.status = status;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to subscribe to {}: {}", entry.script_hash, e);
                    }
                }
            }
            if changed {
                self.save(branch).await?;
            }
        }
        Ok(())
    }

    /// Subscribe to a script hash and add it to the branch list.
    pub async fn watch_address<P: ChainProvider + ?Sized>(
        &mut self,
        provider: &P,
        script_hash: &str,
        branch: Branch,
    ) -> StorageResult<()> {
        let status = match provider.subscribe_to_address(script_hash).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Failed to subscribe to {}: {}", script_hash, e);
                return Ok(());
            }
        };

        let max = self.max;
        let list = self.list_mut(branch);
        match list.iter_mut().find(|w| w.script_hash == script_hash) {
            Some(existing) => existing.status = status,
            None => {
                if list.len() >= max {
                    let dropped = list.remove(0);
                    tracing::debug!("Watch list for {} full, dropping {}", branch, dropped.script_hash);
                }
                list.push(WatchedScript {
                    script_hash: script_hash.to_string(),
                    status,
                });
            }
        }
        self.save(branch).await
    }

    /// Branch and last known status of a watched script hash.
    pub fn find(&self, script_hash: &str) -> Option<(Branch, Option<String>)> {
        Branch::ALL.into_iter().find_map(|branch| {
            self.list(branch)
                .iter()
                .find(|w| w.script_hash == script_hash)
                .map(|w| (branch, w.status.clone()))
        })
    }

    pub async fn update_status(&mut self, script_hash: &str, status: Option<String>) -> StorageResult<()> {
        let Some((branch, _)) = self.find(script_hash) else {
            return Ok(());
        };
        if let Some(entry) = self.list_mut(branch).iter_mut().find(|w| w.script_hash == script_hash) {
            entry.status = status;
        }
        self.save(branch).await
    }

    /// Release the provider subscriptions of a branch. The list itself is
    /// kept so [`start_watching`](Self::start_watching) can restore them.
    pub async fn stop_watching<P: ChainProvider + ?Sized>(&self, provider: &P, branch: Branch) {
        for entry in self.list(branch) {
            if let Err(e) = provider.unsubscribe_from_address(&entry.script_hash).await {
                tracing::warn!("Failed to unsubscribe from {}: {}", entry.script_hash, e);
            }
        }
    }

    async fn save(&self, branch: Branch) -> StorageResult<()> {
        self.state.set_watched_scripts(branch, self.list(branch)).await
    }
}
