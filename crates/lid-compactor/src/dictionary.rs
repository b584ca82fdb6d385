//! Expanded-hash cache.
//!
//! Indices below the preload bound live in a fixed in-memory array once
//! expanded; everything else goes through the [`BlockStore`]. Entries are
//! only ever filled, and each fill publishes a complete dictionary.

use crate::expander::DictionaryExpander;
use crate::progress::ProgressSink;
use lid_core::{LidError, Progress, Result};
use lid_store::{BlockSource, BlockStore};
use parking_lot::RwLock;
use std::sync::Arc;

/// An expanded block hash of exactly the configured dictionary size.
pub type Dictionary = Arc<[u8]>;

pub struct DictionaryCache {
    store: Arc<dyn BlockStore>,
    source: Option<Arc<dyn BlockSource>>,
    expander: Arc<dyn DictionaryExpander>,
    dictionary_size: usize,
    hot: RwLock<Vec<Option<Dictionary>>>,
}

impl DictionaryCache {
    pub fn new(
        store: Arc<dyn BlockStore>,
        expander: Arc<dyn DictionaryExpander>,
        dictionary_size: usize,
        preload_blocks: usize,
    ) -> Result<Self> {
        if dictionary_size < lid_core::BATCH_SIZE {
            return Err(LidError::InvalidConfig(format!(
                "dictionary size {dictionary_size} cannot hold a batch"
            )));
        }
        Ok(Self {
            store,
            source: None,
            expander,
            dictionary_size,
            hot: RwLock::new(vec![None; preload_blocks]),
        })
    }

    /// Fetch blocks missing from the store from `source`.
    pub fn with_source(mut self, source: Arc<dyn BlockSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary_size
    }

    pub fn preload_bound(&self) -> usize {
        self.hot.read().len()
    }

    pub async fn block_count(&self) -> Result<u64> {
        self.store.block_count().await
    }

    /// Already-expanded dictionary from the hot array, if any.
    pub fn cached(&self, index: u64) -> Option<Dictionary> {
        let hot = self.hot.read();
        usize::try_from(index).ok().and_then(|i| hot.get(i)).and_then(|d| d.clone())
    }

    fn publish(&self, index: u64, dictionary: &Dictionary) {
        let mut hot = self.hot.write();
        if let Some(slot) = usize::try_from(index).ok().and_then(|i| hot.get_mut(i)) {
            if slot.is_none() {
                *slot = Some(dictionary.clone());
            }
        }
    }

    /// Raw data for `index`, mirroring it from the source when the store
    /// lacks it.
    pub async fn ensure_block_available(&self, index: u64) -> Result<Vec<u8>> {
        if let Some(raw) = self.store.raw_block(index).await? {
            return Ok(raw);
        }
        let Some(source) = &self.source else {
            return Err(LidError::BlockUnavailable { index, reason: "not in local store".into() });
        };
        let block = source
            .fetch_block(index)
            .await
            .map_err(|e| LidError::BlockUnavailable { index, reason: e.to_string() })?;
        let raw = block.raw_data.clone();
        self.store.put_raw_block(block).await?;
        tracing::debug!(index, "fetched missing block");
        Ok(raw)
    }

    /// Valid dictionary for `index`, expanding and persisting it when the
    /// stored one is missing or has the wrong length.
    pub async fn get(&self, index: u64) -> Result<Dictionary> {
        if let Some(dictionary) = self.cached(index) {
            return Ok(dictionary);
        }
        let dictionary: Dictionary = match self.store.expanded_hash(index).await? {
            Some(bytes) if bytes.len() == self.dictionary_size => bytes.into(),
            _ => {
                let raw = self.ensure_block_available(index).await?;
                let bytes = self.expander.expand(&raw, self.dictionary_size);
                if bytes.len() != self.dictionary_size {
                    return Err(LidError::Other(anyhow::anyhow!(
                        "expander returned {} bytes for block {index}, expected {}",
                        bytes.len(),
                        self.dictionary_size
                    )));
                }
                self.store.set_expanded_hash(index, bytes.clone()).await?;
                bytes.into()
            }
        };
        self.publish(index, &dictionary);
        Ok(dictionary)
    }

    /// Validate or compute the dictionaries of every stored block below the
    /// preload bound. Unavailable blocks are skipped. Returns how many
    /// dictionaries are now hot.
    pub async fn preload(&self, progress: &dyn ProgressSink) -> Result<usize> {
        let count = self.block_count().await?.min(self.preload_bound() as u64);
        let missing = self.store.missing_expanded_hashes(self.dictionary_size, count).await?;
        tracing::info!(blocks = count, invalid = missing.len(), "expanding hashes");

        let mut loaded = 0;
        for index in 0..count {
            match self.get(index).await {
                Ok(_) => loaded += 1,
                Err(LidError::BlockUnavailable { .. }) => continue,
                Err(e) => return Err(e),
            }
            progress.report(Progress::new(index + 1, count, 0, "expanding hashes"));
        }
        Ok(loaded)
    }
}
