//! Block store implementations: in-memory and directory-backed.

mod file;
mod memory;

pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;

use async_trait::async_trait;
use lid_core::{Block, Result};

/// Local mirror of ledger blocks plus the dictionaries derived from them.
///
/// Entries are write-once: raw blocks never change after insertion and an
/// expanded hash is only replaced when the stored one is invalid.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Highest stored block index + 1.
    async fn block_count(&self) -> Result<u64>;
    async fn raw_block(&self, index: u64) -> Result<Option<Vec<u8>>>;
    /// Bulk insert keyed by block index; existing indices are overwritten.
    async fn put_raw_blocks(&self, blocks: Vec<Block>) -> Result<()>;
    async fn expanded_hash(&self, index: u64) -> Result<Option<Vec<u8>>>;
    async fn set_expanded_hash(&self, index: u64, bytes: Vec<u8>) -> Result<()>;

    async fn put_raw_block(&self, block: Block) -> Result<()> {
        self.put_raw_blocks(vec![block]).await
    }

    /// Stored blocks below `limit` whose expanded hash is absent or not
    /// exactly `dictionary_size` bytes long.
    async fn missing_expanded_hashes(&self, dictionary_size: usize, limit: u64) -> Result<Vec<u64>> {
        let end = self.block_count().await?.min(limit);
        let mut missing = Vec::new();
        for index in 0..end {
            if self.raw_block(index).await?.is_none() {
                continue;
            }
            match self.expanded_hash(index).await? {
                Some(bytes) if bytes.len() == dictionary_size => {}
                _ => missing.push(index),
            }
        }
        Ok(missing)
    }
}
