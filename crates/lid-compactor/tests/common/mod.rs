#![allow(dead_code)]

use lid_compactor::{CompressionEngine, DictionaryCache, DictionaryExpander};
use lid_core::{CompressionConfig, Progress};
use lid_store::MemoryBlockStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Dictionary = the raw block itself, zero-padded or cut to size. Lets tests
/// pick dictionaries whose content they control.
pub struct RawExpander;

impl DictionaryExpander for RawExpander {
    fn expand(&self, raw: &[u8], size: usize) -> Vec<u8> {
        let mut out = raw.to_vec();
        out.resize(size, 0);
        out
    }
}

/// Byte string containing every ordered pair over `alphabet` exactly once
/// as a window (de Bruijn sequence of order 2, made linear).
pub fn de_bruijn(alphabet: &[u8]) -> Vec<u8> {
    fn visit(t: usize, p: usize, k: usize, a: &mut [usize], out: &mut Vec<usize>) {
        if t > 2 {
            if 2 % p == 0 {
                out.extend_from_slice(&a[1..=p]);
            }
            return;
        }
        a[t] = a[t - p];
        visit(t + 1, p, k, a, out);
        for j in a[t - p] + 1..k {
            a[t] = j;
            visit(t + 1, t, k, a, out);
        }
    }

    let mut a = [0usize; 3];
    let mut symbols = Vec::new();
    visit(1, 1, alphabet.len(), &mut a, &mut symbols);
    let mut seq: Vec<u8> = symbols.into_iter().map(|i| alphabet[i]).collect();
    if let Some(&first) = seq.first() {
        seq.push(first);
    }
    seq
}

/// Sixteen letters; a dictionary of their pairs fits in 2^12 bytes.
pub const TEXT_ALPHABET: &[u8] = b" abcdehilmnorstu";

/// Every byte pair, for dictionaries of 2^17 bytes.
pub fn all_pairs() -> Vec<u8> {
    let alphabet: Vec<u8> = (0..=255).collect();
    de_bruijn(&alphabet)
}

/// Deterministic text drawn from [`TEXT_ALPHABET`].
pub fn sample_text(len: usize) -> Vec<u8> {
    let words: [&[u8]; 9] = [
        b"the ", b"miners ", b"hold ", b"a ", b"sealed ", b"chain ", b"hashed ", b"to ", b"dust ",
    ];
    words.iter().cycle().flat_map(|w| w.iter().copied()).take(len).collect()
}

pub fn config(bits: u32) -> CompressionConfig {
    CompressionConfig { dictionary_bits: bits, ..CompressionConfig::default() }
}

pub fn engine_over(blocks: Vec<Vec<u8>>, config: CompressionConfig) -> (CompressionEngine, Arc<MemoryBlockStore>) {
    let store = Arc::new(MemoryBlockStore::with_blocks(blocks));
    let cache = DictionaryCache::new(
        store.clone(),
        Arc::new(RawExpander),
        config.dictionary_size(),
        config.preload_blocks,
    )
    .unwrap();
    (CompressionEngine::new(config, Arc::new(cache)).unwrap(), store)
}

/// Collects every progress event.
#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<Progress>>);

impl Recorder {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().iter().map(|p| p.message.clone()).collect()
    }
}

impl lid_compactor::ProgressSink for Recorder {
    fn report(&self, progress: Progress) {
        self.0.lock().push(progress);
    }
}

pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
