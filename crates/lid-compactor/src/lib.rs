//! Ledger-derived dictionary compressor.
//!
//! The dictionary is never stored with the output: each block of a public
//! ledger is expanded through iterated hashing into a fixed-size byte table,
//! and compressed data refers to two-byte windows of those tables by
//! (block index, offset). Compression repeats layer after layer while the
//! output keeps shrinking.
//!
//! Components:
//! 1. [`expander`] block bytes → dictionary
//! 2. [`dictionary`] hot array + durable store of dictionaries
//! 3. [`match_finder`] locate every batch of a chunk in one dictionary
//! 4. [`record`] bit-packed varint + fixed-width offset records
//! 5. [`layer`] one encode or decode pass over a file
//! 6. [`pipeline`] the multi-layer loop and artifact lifecycle

pub mod artifact;
pub mod dictionary;
pub mod expander;
pub mod layer;
pub mod match_finder;
pub mod pipeline;
pub mod progress;
pub mod record;

pub use artifact::ArtifactMeta;
pub use dictionary::{Dictionary, DictionaryCache};
pub use expander::{DictionaryExpander, HashChainExpander};
pub use layer::LayerEngine;
pub use match_finder::{find_best_matches, MatchResult};
pub use pipeline::{CompressionEngine, CompressionSummary};
pub use progress::{ChannelProgress, NoProgress, ProgressSink};
pub use record::{BitReader, BitWriter, Record, RecordCodec};
