//! Mirror process copying finalized blocks from a [`BlockSource`] into a
//! [`BlockStore`].
//!
//! Pausing is cooperative, not cancellation: [`ChainSync::pause`] raises
//! `pause_requested` and polls until the running sync has flushed its buffer
//! and set `is_paused` back to true. The request is dropped once the pauser
//! sees the sync stopped, so an idle pause never affects a later sync.

use crate::source::BlockSource;
use crate::store::BlockStore;
use lid_core::{Block, LidError, Result, SyncConfig};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sync progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Newest mirrored block, if any.
    pub index: Option<u64>,
    pub tip: u64,
    pub message: String,
}

impl SyncStatus {
    fn new(index: Option<u64>, tip: u64, message: impl Into<String>) -> Self {
        Self { index, tip, message: message.into() }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.message, self.index.unwrap_or(0), self.tip)
    }
}

pub struct ChainSync {
    store: Arc<dyn BlockStore>,
    source: Arc<dyn BlockSource>,
    config: SyncConfig,
    pause_requested: AtomicBool,
    is_paused: AtomicBool,
}

impl ChainSync {
    pub fn new(store: Arc<dyn BlockStore>, source: Arc<dyn BlockSource>, config: SyncConfig) -> Self {
        Self {
            store,
            source,
            config,
            pause_requested: AtomicBool::new(false),
            is_paused: AtomicBool::new(true),
        }
    }

    pub fn is_syncing(&self) -> bool {
        !self.is_paused.load(Ordering::Acquire)
    }

    /// Mirror blocks up to the remote tip, or until paused.
    ///
    /// Returns the newest mirrored block index.
    pub async fn sync<F>(&self, on_status: F) -> Result<Option<u64>>
    where
        F: Fn(&SyncStatus) + Send + Sync,
    {
        if self
            .is_paused
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LidError::SyncAlreadyRunning);
        }

        // A request raised before the swap belongs to a pauser that is now
        // waiting on this run, so it is honored rather than cleared.
        let result = self.run(&on_status).await;
        self.pause_requested.store(false, Ordering::Release);
        self.is_paused.store(true, Ordering::Release);
        result
    }

    async fn run(&self, on_status: &(dyn Fn(&SyncStatus) + Send + Sync)) -> Result<Option<u64>> {
        let tip = self.source.tip_index().await?;
        let mut next = self.store.block_count().await?;
        let mut last = next.checked_sub(1);
        let mut pending: Vec<Block> = Vec::with_capacity(self.config.flush_every);
        tracing::info!(from = next, tip, "blockchain sync started");

        while next <= tip && !self.pause_requested.load(Ordering::Acquire) {
            let block = match self.source.fetch_block(next).await {
                Ok(block) => block,
                Err(e) => {
                    self.flush(&mut pending).await?;
                    return Err(e);
                }
            };
            pending.push(block);
            last = Some(next);
            if pending.len() >= self.config.flush_every {
                self.flush(&mut pending).await?;
            }
            on_status(&SyncStatus::new(last, tip, "Syncing..."));
            next += 1;
        }
        self.flush(&mut pending).await?;

        let paused = self.pause_requested.load(Ordering::Acquire) && next <= tip;
        let message = if paused { "Paused" } else { "Synced" };
        tracing::info!(last = ?last, tip, message, "blockchain sync stopped");
        on_status(&SyncStatus::new(last, tip, message));
        Ok(last)
    }

    async fn flush(&self, pending: &mut Vec<Block>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(pending);
        tracing::debug!(count = batch.len(), "flushing mirrored blocks");
        self.store.put_raw_blocks(batch).await
    }

    /// Ask a running sync to stop after its current block and wait until it
    /// has. Returns immediately when nothing is syncing; the request does not
    /// outlive the call.
    pub async fn pause(&self) {
        self.pause_requested.store(true, Ordering::Release);
        let interval = self.config.poll_interval();
        while !self.is_paused.load(Ordering::Acquire) {
            tokio::time::sleep(interval).await;
        }
        self.pause_requested.store(false, Ordering::Release);
    }

    /// Current mirror position against the remote tip.
    pub async fn status(&self) -> Result<SyncStatus> {
        let tip = self.source.tip_index().await?;
        let count = self.store.block_count().await?;
        let message = if self.is_syncing() { "Syncing..." } else { "Sync not started" };
        Ok(SyncStatus::new(count.checked_sub(1), tip, message))
    }
}
