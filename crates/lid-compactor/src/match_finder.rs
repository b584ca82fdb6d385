//! Locate every batch of a chunk inside a single block dictionary.

use crate::dictionary::DictionaryCache;
use lid_core::{LidError, Match, Result, BATCH_SIZE};

/// One batch of a chunk. A trailing odd byte forms a batch of `len == 1`
/// whose second byte is padding and matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub bytes: [u8; BATCH_SIZE],
    pub len: usize,
}

/// Split the meaningful bytes of a chunk into batches. Batches past the end
/// of a short chunk are not produced at all.
pub fn split_batches(chunk: &[u8]) -> Vec<Batch> {
    chunk
        .chunks(BATCH_SIZE)
        .map(|c| {
            let mut bytes = [0u8; BATCH_SIZE];
            bytes[..c.len()].copy_from_slice(c);
            Batch { bytes, len: c.len() }
        })
        .collect()
}

/// First offset of `batch` in `dictionary`.
pub fn find_batch(dictionary: &[u8], batch: &Batch) -> Option<u32> {
    dictionary
        .windows(BATCH_SIZE)
        .position(|w| w[..batch.len] == batch.bytes[..batch.len])
        .map(|p| p as u32)
}

/// Offsets of each batch in one dictionary.
pub fn match_against(dictionary: &[u8], batches: &[Batch]) -> Vec<Option<u32>> {
    batches.iter().map(|b| find_batch(dictionary, b)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Exactly `batch_count` matches sharing one block.
    Full(Vec<Match>),
    /// No block held every batch; the best partial candidate is reported.
    Partial {
        best_block: Option<u64>,
        best_matched: usize,
        batches: usize,
    },
}

impl MatchResult {
    /// Turn a partial result into the error raised for the chunk at
    /// `offset` of `layer`.
    pub fn into_full(self, layer: u32, offset: u64) -> Result<Vec<Match>> {
        match self {
            Self::Full(matches) => Ok(matches),
            Self::Partial { best_block, best_matched, batches } => Err(LidError::UnmatchableChunk {
                layer,
                offset,
                best_block,
                best_matched,
                batches,
            }),
        }
    }
}

/// Scan blocks in increasing index order and stop at the first whose
/// dictionary contains every batch of `chunk`.
///
/// `chunk` holds only real bytes (at most `batch_count * 2`). Batches the
/// chunk is too short to fill reuse the first batch's offset so the record
/// still carries `batch_count` offsets. Unavailable blocks never match.
pub async fn find_best_matches(
    cache: &DictionaryCache,
    chunk: &[u8],
    batch_count: usize,
) -> Result<MatchResult> {
    let batches = split_batches(chunk);
    if batches.is_empty() || batches.len() > batch_count {
        return Err(LidError::InvalidRecord(format!(
            "chunk of {} bytes does not fit {batch_count} batches",
            chunk.len()
        )));
    }

    // Re-read every chunk: a concurrent sync may have grown the store.
    let block_count = cache.block_count().await?;
    let mut best_block = None;
    let mut best_matched = 0;

    for block_index in 0..block_count {
        let dictionary = match cache.get(block_index).await {
            Ok(d) => d,
            Err(LidError::BlockUnavailable { index, reason }) => {
                tracing::debug!(index, %reason, "skipping unavailable block");
                continue;
            }
            Err(e) => return Err(e),
        };

        let offsets = match_against(&dictionary, &batches);
        let matched = offsets.iter().filter(|o| o.is_some()).count();
        if matched > best_matched {
            best_matched = matched;
            best_block = Some(block_index);
        }
        if matched == batches.len() {
            let mut matches: Vec<Match> = offsets
                .into_iter()
                .flatten()
                .map(|offset| Match::new(block_index, offset))
                .collect();
            let filler = matches[0];
            matches.resize(batch_count, filler);
            return Ok(MatchResult::Full(matches));
        }
    }

    Ok(MatchResult::Partial { best_block, best_matched, batches: batches.len() })
}
