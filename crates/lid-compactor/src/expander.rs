//! Block bytes → fixed-size dictionary.

use sha2::{Digest, Sha256};

/// Deterministic derivation of a dictionary from raw block bytes.
///
/// Compression and decompression must use the same expander: the output is
/// the only thing tying a record to its original bytes.
pub trait DictionaryExpander: Send + Sync {
    /// Returns exactly `size` bytes.
    fn expand(&self, raw: &[u8], size: usize) -> Vec<u8>;
}

/// SHA-256 hash chain.
///
/// `h0 = sha256(raw)`, `h(i+1) = sha256(h(i))`; the dictionary is
/// `h0 ++ h1 ++ ...` cut to `size` bytes. Each link rehashes only the
/// previous 32-byte digest, not the whole accumulated chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashChainExpander;

impl DictionaryExpander for HashChainExpander {
    fn expand(&self, raw: &[u8], size: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(size + 32);
        let mut link = Sha256::digest(raw);
        out.extend_from_slice(&link);
        while out.len() < size {
            link = Sha256::digest(&link);
            out.extend_from_slice(&link);
        }
        out.truncate(size);
        out
    }
}
