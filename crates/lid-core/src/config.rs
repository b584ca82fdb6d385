use crate::error::{LidError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LidConfig {
    pub compression: CompressionConfig,
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Two-byte batches per chunk.
    pub batches: usize,
    /// Layers produced regardless of size gains. 0 disables the floor.
    pub min_layers: u32,
    /// Hard cap on layers. 0 means unlimited.
    pub max_layers: u32,
    /// Offset width in bits; the dictionary holds `2^dictionary_bits` bytes.
    pub dictionary_bits: u32,
    /// Block indices below this bound are kept in memory once expanded.
    pub preload_blocks: usize,
    pub artifact_extension: String,
}

impl CompressionConfig {
    pub fn chunk_size(&self) -> usize {
        self.batches * crate::types::BATCH_SIZE
    }

    pub fn dictionary_size(&self) -> usize {
        1usize << self.dictionary_bits
    }

    pub fn validate(&self) -> Result<()> {
        if self.batches == 0 {
            return Err(LidError::InvalidConfig("batches must be at least 1".into()));
        }
        if !(2..=24).contains(&self.dictionary_bits) {
            return Err(LidError::InvalidConfig(format!(
                "dictionary_bits must be within 2..=24, got {}",
                self.dictionary_bits
            )));
        }
        if self.max_layers != 0 && self.max_layers < self.min_layers {
            return Err(LidError::InvalidConfig(format!(
                "max_layers ({}) is below min_layers ({})",
                self.max_layers, self.min_layers
            )));
        }
        let ext = &self.artifact_extension;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LidError::InvalidConfig(format!("invalid artifact extension: {ext:?}")));
        }
        Ok(())
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            batches: 4,
            min_layers: 0,
            max_layers: 0,
            dictionary_bits: 12,
            preload_blocks: 65536,
            artifact_extension: "lid".into(),
        }
    }
}

/// Ledger node JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub address: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:9332/".into(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self { data_dir: base.join("lid") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fetched blocks buffered before a bulk insert.
    pub flush_every: usize,
    pub poll_interval_ms: u64,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { flush_every: 100, poll_interval_ms: 50 }
    }
}

impl LidConfig {
    /// Load settings from a JSON file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| LidError::InvalidConfig(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load settings if the file exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.compression.validate()?;
        if self.sync.flush_every == 0 {
            return Err(LidError::InvalidConfig("sync.flush_every must be at least 1".into()));
        }
        Ok(())
    }
}
