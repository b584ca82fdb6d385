use super::BlockStore;
use async_trait::async_trait;
use lid_core::{Block, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// In-memory block store.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<BTreeMap<u64, Vec<u8>>>,
    hashes: RwLock<HashMap<u64, Vec<u8>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw blocks at indices `0..n`.
    pub fn with_blocks<I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let store = Self::new();
        {
            let mut map = store.blocks.write();
            for (i, raw) in blocks.into_iter().enumerate() {
                map.insert(i as u64, raw);
            }
        }
        store
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.read().len()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn block_count(&self) -> Result<u64> {
        Ok(self.blocks.read().keys().next_back().map_or(0, |i| i + 1))
    }

    async fn raw_block(&self, index: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.read().get(&index).cloned())
    }

    async fn put_raw_blocks(&self, blocks: Vec<Block>) -> Result<()> {
        let mut map = self.blocks.write();
        for block in blocks {
            map.insert(block.index, block.raw_data);
        }
        Ok(())
    }

    async fn expanded_hash(&self, index: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.hashes.read().get(&index).cloned())
    }

    async fn set_expanded_hash(&self, index: u64, bytes: Vec<u8>) -> Result<()> {
        self.hashes.write().insert(index, bytes);
        Ok(())
    }
}
