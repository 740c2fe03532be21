//! Chain tip tracking.

use crate::error::StorageResult;
use crate::state::StateDb;

/// A forward move of the tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUpdate {
    pub current: u32,
    /// Tip before this update, 0 if none was known.
    pub last: u32,
    pub diff: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockChange {
    Advanced(BlockUpdate),
    Unchanged,
    /// The tip went backwards. The stored tip is left as it was.
    Regressed {
        last: u32,
        height: u32,
    },
}

pub struct BlockCounter {
    state: StateDb,
    height: u32,
}

impl BlockCounter {
    pub async fn load(state: StateDb) -> StorageResult<Self> {
        let height = state.latest_block().await?;
        Ok(Self {
            state,
            height,
        })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub async fn set_block(&mut self, height: u32) -> StorageResult<BlockChange> {
        let last = self.height;
        if height < last {
            tracing::warn!(
                "Block height went back from {} to {}, possible chain reorganization",
                last,
                height
            );
            return Ok(BlockChange::Regressed {
                last,
                height,
            });
        }
        if height == last {
            return Ok(BlockChange::Unchanged);
        }

        self.state.set_latest_block(height).await?;
        self.height = height;
        Ok(BlockChange::Advanced(BlockUpdate {
            current: height,
            last,
            diff: height - last,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_block_counter() {
        let store = MemoryStore::new();
        let state = StateDb::new(&store).unwrap();
        let mut counter = BlockCounter::load(state.clone()).await.unwrap();
        assert_eq!(counter.height(), 0);

        assert_eq!(
            counter.set_block(100).await.unwrap(),
            BlockChange::Advanced(BlockUpdate {
                current: 100,
                last: 0,
                diff: 100,
            })
        );
        assert_eq!(counter.set_block(100).await.unwrap(), BlockChange::Unchanged);
        assert_eq!(
            counter.set_block(98).await.unwrap(),
            BlockChange::Regressed {
                last: 100,
                height: 98,
            }
        );
        assert_eq!(counter.height(), 100);

        let reloaded = BlockCounter::load(state).await.unwrap();
        assert_eq!(reloaded.height(), 100);
    }
}
