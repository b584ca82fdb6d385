//! Block mirror for the ledger-derived dictionary compressor.
//!
//! - [`store`]: local persistence of raw blocks and their expanded hashes
//! - [`source`]: remote ledger node access
//! - [`sync`]: the mirror process with cooperative pause

pub mod source;
pub mod store;
pub mod sync;

pub use source::{BlockSource, RpcBlockSource, StaticBlockSource};
pub use store::{BlockStore, FileBlockStore, MemoryBlockStore};
pub use sync::{ChainSync, SyncStatus};
