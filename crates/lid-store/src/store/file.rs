use super::BlockStore;
use async_trait::async_trait;
use lid_core::{Block, LidError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const BLOCKS_DIR: &str = "blocks";
const HASHES_DIR: &str = "dict";
const BLOCK_EXT: &str = "blk";
const HASH_EXT: &str = "dict";

/// Directory-backed block store.
///
/// Layout under the root:
/// - `blocks/<index>.blk` raw block bytes
/// - `dict/<index>.dict` expanded hash bytes
///
/// Every write goes to a temp file that is renamed into place, so a reader
/// sees either no entry or a complete one.
pub struct FileBlockStore {
    root: PathBuf,
    count: AtomicU64,
}

impl FileBlockStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [BLOCKS_DIR, HASHES_DIR] {
            fs::create_dir_all(root.join(dir))
                .await
                .map_err(|e| LidError::Storage(format!("mkdir {}: {e}", root.join(dir).display())))?;
        }
        let count = scan_block_count(&root.join(BLOCKS_DIR)).await?;
        tracing::debug!(root = %root.display(), count, "opened block store");
        Ok(Self { root, count: AtomicU64::new(count) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, index: u64) -> PathBuf {
        self.root.join(BLOCKS_DIR).join(format!("{index}.{BLOCK_EXT}"))
    }

    fn hash_path(&self, index: u64) -> PathBuf {
        self.root.join(HASHES_DIR).join(format!("{index}.{HASH_EXT}"))
    }
}

async fn scan_block_count(dir: &Path) -> Result<u64> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| LidError::Storage(format!("read_dir {}: {e}", dir.display())))?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".blk")) else { continue };
        if let Ok(index) = stem.parse::<u64>() {
            count = count.max(index + 1);
        }
    }
    Ok(count)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LidError::Storage(format!("read {}: {e}", path.display()))),
    }
}

/// Distinguishes temp files of concurrent writers of the same entry.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));
    let result = async {
        let mut f = fs::File::create(&tmp_path).await?;
        f.write_all(data).await?;
        f.flush().await?;
        f.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(LidError::Storage(format!("write {}: {e}", path.display())));
    }
    Ok(())
}

#[async_trait]
impl BlockStore for FileBlockStore {
    async fn block_count(&self) -> Result<u64> {
        Ok(self.count.load(Ordering::Acquire))
    }

    async fn raw_block(&self, index: u64) -> Result<Option<Vec<u8>>> {
        read_optional(&self.block_path(index)).await
    }

    async fn put_raw_blocks(&self, blocks: Vec<Block>) -> Result<()> {
        for block in blocks {
            write_atomic(&self.block_path(block.index), &block.raw_data).await?;
            self.count.fetch_max(block.index + 1, Ordering::AcqRel);
        }
        Ok(())
    }

    async fn expanded_hash(&self, index: u64) -> Result<Option<Vec<u8>>> {
        read_optional(&self.hash_path(index)).await
    }

    async fn set_expanded_hash(&self, index: u64, bytes: Vec<u8>) -> Result<()> {
        write_atomic(&self.hash_path(index), &bytes).await
    }
}
