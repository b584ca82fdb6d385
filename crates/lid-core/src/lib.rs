//! Shared configuration, error taxonomy, and data types for the
//! ledger-derived dictionary compressor.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompressionConfig, LidConfig, RpcConfig, StorageConfig, SyncConfig};
pub use error::{LidError, Result};
pub use types::{Block, ExpandedHash, Match, Progress, BATCH_SIZE};
