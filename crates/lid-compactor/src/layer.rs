//! One compression or decompression pass over a file.
//!
//! Layer bit-stream: `varint(source_len)` then `ceil(source_len / chunk_size)`
//! records, zero-padded to a byte boundary. The length prefix is what lets
//! decoding drop the padding of the final chunk without guessing, so files
//! ending in zero bytes come back intact.

use crate::dictionary::DictionaryCache;
use crate::match_finder::find_best_matches;
use crate::progress::ProgressSink;
use crate::record::{read_varint, write_varint, BitReader, BitWriter, RecordCodec, MAX_VARINT_BITS};
use lid_core::{CompressionConfig, LidError, Progress, Result, BATCH_SIZE};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

const READ_BUFFER: usize = 64 * 1024;

pub struct LayerEngine<'a> {
    cache: &'a DictionaryCache,
    codec: RecordCodec,
}

impl<'a> LayerEngine<'a> {
    pub fn new(cache: &'a DictionaryCache, config: &CompressionConfig) -> Self {
        Self {
            cache,
            codec: RecordCodec::new(config.batches, config.dictionary_bits),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.codec.batch_count * BATCH_SIZE
    }

    /// Encode `source` into `target` as layer `layer`. Returns the target size.
    pub async fn compress_layer(
        &self,
        source: &Path,
        target: &Path,
        layer: u32,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let input = File::open(source).await?;
        let total = input.metadata().await?.len();
        let mut reader = BufReader::with_capacity(READ_BUFFER, input);
        let mut writer = BufWriter::new(File::create(target).await?);

        let mut bits = BitWriter::new();
        write_varint(&mut bits, total);

        let mut chunk = vec![0u8; self.chunk_size()];
        let mut offset = 0u64;
        while offset < total {
            let n = read_up_to(&mut reader, &mut chunk).await?;
            if n == 0 {
                return Err(LidError::Storage(format!(
                    "{} shrank to {offset} bytes during layer {layer}",
                    source.display()
                )));
            }
            let matches = find_best_matches(self.cache, &chunk[..n], self.codec.batch_count)
                .await?
                .into_full(layer, offset)?;
            self.codec.encode(&matches, &mut bits)?;
            writer.write_all(&bits.take_bytes()).await?;

            offset += n as u64;
            progress.report(Progress::new(offset, total, layer, "Compressing..."));
        }

        writer.write_all(&bits.finish()).await?;
        writer.flush().await?;
        let size = writer.get_ref().metadata().await?.len();
        tracing::debug!(layer, input = total, output = size, "layer compressed");
        Ok(size)
    }

    /// Decode layer `layer` in `source` back into `target`, the layer below.
    /// Returns the target size.
    pub async fn decompress_layer(
        &self,
        source: &Path,
        target: &Path,
        layer: u32,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let mut reader = BufReader::with_capacity(READ_BUFFER, File::open(source).await?);
        let mut writer = BufWriter::new(File::create(target).await?);
        let mut bits = BitReader::default();
        let mut eof = false;

        refill(&mut reader, &mut bits, MAX_VARINT_BITS, &mut eof).await?;
        let (total, _) = read_varint(&mut bits)
            .map_err(|e| LidError::CorruptArtifact(format!("layer {layer} length prefix: {e}")))?;

        let chunk_size = self.chunk_size() as u64;
        let mut written = 0u64;
        let mut chunk = Vec::with_capacity(self.chunk_size());
        while written < total {
            refill(&mut reader, &mut bits, self.codec.max_record_bits(), &mut eof).await?;
            let record = self.codec.decode(&mut bits).map_err(|e| match e {
                LidError::CorruptArtifact(msg) => {
                    LidError::CorruptArtifact(format!("layer {layer} at output offset {written}: {msg}"))
                }
                other => other,
            })?;
            let dictionary = self.cache.get(record.block_index).await?;

            chunk.clear();
            for &o in &record.offsets {
                let o = o as usize;
                chunk.extend_from_slice(&dictionary[o..o + BATCH_SIZE]);
            }
            let take = chunk_size.min(total - written) as usize;
            writer.write_all(&chunk[..take]).await?;

            written += take as u64;
            progress.report(Progress::new(written, total, layer, "Decompressing..."));
        }

        refill(&mut reader, &mut bits, 8, &mut eof).await?;
        if bits.remaining_bits() >= 8 {
            return Err(LidError::CorruptArtifact(format!(
                "layer {layer} has trailing data after {total} bytes"
            )));
        }

        writer.flush().await?;
        tracing::debug!(layer, output = written, "layer decompressed");
        Ok(written)
    }
}

/// Fill `buf` as far as the reader allows.
async fn read_up_to<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Top up `bits` until it holds at least `needed` bits or the input ends.
async fn refill<R: AsyncRead + Unpin>(
    reader: &mut R,
    bits: &mut BitReader,
    needed: u64,
    eof: &mut bool,
) -> Result<()> {
    let mut buf = [0u8; 4096];
    while !*eof && bits.remaining_bits() < needed {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            *eof = true;
        } else {
            bits.extend(&buf[..n]);
        }
    }
    Ok(())
}
