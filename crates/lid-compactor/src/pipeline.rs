//! Multi-layer compression loop and the artifact file lifecycle.

use crate::artifact::{self, ArtifactMeta};
use crate::dictionary::DictionaryCache;
use crate::expander::HashChainExpander;
use crate::layer::LayerEngine;
use crate::progress::ProgressSink;
use lid_core::{CompressionConfig, LidError, Progress, Result};
use lid_store::{BlockSource, BlockStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Outcome of a finished compression run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionSummary {
    pub artifact: PathBuf,
    pub original_len: u64,
    pub compressed_len: u64,
    pub layers: u32,
}

impl CompressionSummary {
    pub fn ratio(&self) -> f64 {
        if self.original_len == 0 {
            return 1.0;
        }
        self.compressed_len as f64 / self.original_len as f64
    }
}

pub struct CompressionEngine {
    config: CompressionConfig,
    cache: Arc<DictionaryCache>,
}

impl CompressionEngine {
    pub fn new(config: CompressionConfig, cache: Arc<DictionaryCache>) -> Result<Self> {
        config.validate()?;
        if cache.dictionary_size() != config.dictionary_size() {
            return Err(LidError::InvalidConfig(format!(
                "cache holds {}-byte dictionaries, configuration needs {}",
                cache.dictionary_size(),
                config.dictionary_size()
            )));
        }
        Ok(Self { config, cache })
    }

    /// Engine over `store` with the SHA-256 hash-chain dictionaries.
    pub fn with_store(
        config: CompressionConfig,
        store: Arc<dyn BlockStore>,
        source: Option<Arc<dyn BlockSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let mut cache = DictionaryCache::new(
            store,
            Arc::new(HashChainExpander),
            config.dictionary_size(),
            config.preload_blocks,
        )?;
        if let Some(source) = source {
            cache = cache.with_source(source);
        }
        Self::new(config, Arc::new(cache))
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DictionaryCache> {
        &self.cache
    }

    fn keep_going(&self, layer: u32, size: u64, previous: u64) -> bool {
        let floor_pending = self.config.min_layers != 0 && layer < self.config.min_layers;
        let under_cap = self.config.max_layers == 0 || layer < self.config.max_layers;
        (floor_pending || size < previous) && under_cap
    }

    /// Compress `path` layer by layer into an artifact next to it.
    pub async fn compress(&self, path: &Path, progress: &dyn ProgressSink) -> Result<CompressionSummary> {
        let original_len = fs::metadata(path).await?.len();
        let (base, extension) = artifact::split_original(path)?;
        let ext = self.config.artifact_extension.as_str();
        tracing::info!(file = %path.display(), size = original_len, "compression started");

        progress.report(Progress::new(0, original_len, 0, "removing old files"));
        remove_layer_files(&base, ext).await?;

        self.cache.preload(progress).await?;

        let engine = LayerEngine::new(&self.cache, &self.config);
        let mut created: Vec<PathBuf> = Vec::new();
        let mut previous = original_len;
        let mut layer = 0u32;
        let mut size;
        loop {
            layer += 1;
            let source = if layer == 1 { path.to_path_buf() } else { artifact::layer_path(&base, layer - 1, ext) };
            let target = artifact::layer_path(&base, layer, ext);
            created.push(target.clone());

            size = match engine.compress_layer(&source, &target, layer, progress).await {
                Ok(size) => size,
                Err(e) => {
                    tracing::warn!(layer, error = %e, "compression failed, removing layer files");
                    remove_files(&created).await;
                    return Err(e);
                }
            };
            tracing::info!(layer, input = previous, output = size, "layer produced");

            if !self.keep_going(layer, size, previous) {
                break;
            }
            previous = size;
        }

        let terminal = created.pop().ok_or_else(|| LidError::Other(anyhow::anyhow!("no layer produced")))?;
        progress.report(Progress::new(0, created.len() as u64, layer, "removing old files"));
        remove_files(&created).await;

        let meta = ArtifactMeta::new(layer, extension);
        let artifact = artifact::artifact_path(&base, &meta, ext);
        fs::rename(&terminal, &artifact).await?;

        progress.report(Progress::new(size, original_len, layer, "compressed"));
        tracing::info!(artifact = %artifact.display(), layers = layer, original_len, size, "compression finished");
        Ok(CompressionSummary { artifact, original_len, compressed_len: size, layers: layer })
    }

    /// Rebuild the original file from an artifact. Returns its path.
    pub async fn decompress(&self, artifact: &Path, progress: &dyn ProgressSink) -> Result<PathBuf> {
        let ext = self.config.artifact_extension.as_str();
        let (base, meta) = artifact::parse_artifact_path(artifact, ext)?;
        let total = fs::metadata(artifact).await?.len();
        tracing::info!(artifact = %artifact.display(), layers = meta.layers, "decompression started");

        let engine = LayerEngine::new(&self.cache, &self.config);
        let mut created: Vec<PathBuf> = Vec::new();
        for layer in (1..=meta.layers).rev() {
            let source = if layer == meta.layers { artifact.to_path_buf() } else { artifact::layer_path(&base, layer, ext) };
            let target = artifact::layer_path(&base, layer - 1, ext);
            created.push(target.clone());

            if let Err(e) = engine.decompress_layer(&source, &target, layer, progress).await {
                tracing::warn!(layer, error = %e, "decompression failed, removing layer files");
                remove_files(&created).await;
                return Err(e);
            }
            if layer != meta.layers {
                remove_files(std::slice::from_ref(&source)).await;
            }
        }

        let restored = artifact::restored_path(&base, &meta);
        let bottom = artifact::layer_path(&base, 0, ext);
        fs::rename(&bottom, &restored).await?;

        let size = fs::metadata(&restored).await?.len();
        progress.report(Progress::new(total, total, 0, "decompressed"));
        tracing::info!(file = %restored.display(), size, "decompression finished");
        Ok(restored)
    }
}

/// Delete leftover layer files of `base` from an earlier, interrupted run.
async fn remove_layer_files(base: &Path, artifact_ext: &str) -> Result<()> {
    let Some(base_name) = base.file_name().and_then(|n| n.to_str()) else { return Ok(()) };
    let dir = match base.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if artifact::layer_number(name, base_name, artifact_ext).is_some() {
            tracing::debug!(file = name, "removing stale layer file");
            fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file = %path.display(), error = %e, "could not remove layer file");
            }
        }
    }
}
