use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the atomic matching unit in bytes.
pub const BATCH_SIZE: usize = 2;

/// A raw ledger block, identified by its height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub raw_data: Vec<u8>,
}

impl Block {
    pub fn new(index: u64, raw_data: Vec<u8>) -> Self {
        Self { index, raw_data }
    }
}

/// The dictionary derived from one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedHash {
    pub block_index: u64,
    pub bytes: Vec<u8>,
}

impl ExpandedHash {
    pub fn is_valid(&self, dictionary_size: usize) -> bool {
        self.bytes.len() == dictionary_size
    }
}

/// Location of one batch inside a block dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    pub block_index: u64,
    pub batch_offset: u32,
    pub length: u8,
}

impl Match {
    pub fn new(block_index: u64, batch_offset: u32) -> Self {
        Self { block_index, batch_offset, length: BATCH_SIZE as u8 }
    }
}

/// Status update emitted while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub offset: u64,
    pub total_size: u64,
    pub layer: u32,
    pub message: String,
}

impl Progress {
    pub fn new(offset: u64, total_size: u64, layer: u32, message: impl Into<String>) -> Self {
        Self { offset, total_size, layer, message: message.into() }
    }

    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.offset as f64 / self.total_size as f64 * 100.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.layer > 0 {
            write!(f, "{} (layer {}: {}/{})", self.message, self.layer, self.offset, self.total_size)
        } else {
            write!(f, "{} ({}/{})", self.message, self.offset, self.total_size)
        }
    }
}
