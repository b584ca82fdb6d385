use thiserror::Error;

#[derive(Error, Debug)]
pub enum LidError {
    #[error(
        "No block matches all {batches} batches of the chunk at offset {offset} (layer {layer}); \
         best partial match: {best_matched} in block {best_block:?}"
    )]
    UnmatchableChunk {
        layer: u32,
        offset: u64,
        best_block: Option<u64>,
        best_matched: usize,
        batches: usize,
    },
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),
    #[error("Block {index} unavailable: {reason}")]
    BlockUnavailable { index: u64, reason: String },
    #[error("Blockchain is already syncing")]
    SyncAlreadyRunning,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LidError {
    /// Whether the error is a format problem of the input artifact rather than
    /// an environment or logic failure.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::CorruptArtifact(_))
    }
}

pub type Result<T> = std::result::Result<T, LidError>;
