mod common;

use common::*;
use lid_compactor::{ChannelProgress, CompressionEngine, DictionaryCache, NoProgress};
use lid_core::{CompressionConfig, LidError};
use lid_store::{BlockStore, FileBlockStore, MemoryBlockStore, StaticBlockSource};
use std::path::Path;
use std::sync::Arc;

async fn write(path: &Path, data: &[u8]) {
    tokio::fs::write(path, data).await.unwrap();
}

async fn read(path: &Path) -> Vec<u8> {
    tokio::fs::read(path).await.unwrap()
}

fn text_engine(config: CompressionConfig) -> CompressionEngine {
    engine_over(vec![de_bruijn(TEXT_ALPHABET)], config).0
}

/// Compress, drop the original, decompress, and compare.
async fn roundtrip(engine: &CompressionEngine, path: &Path, data: &[u8]) -> lid_compactor::CompressionSummary {
    write(path, data).await;
    let summary = engine.compress(path, &NoProgress).await.unwrap();
    tokio::fs::remove_file(path).await.unwrap();
    let restored = engine.decompress(&summary.artifact, &NoProgress).await.unwrap();
    assert_eq!(restored, path);
    assert_eq!(read(&restored).await, data);
    summary
}

#[test]
fn test_de_bruijn_covers_every_pair() {
    let seq = de_bruijn(TEXT_ALPHABET);
    assert_eq!(seq.len(), 257);
    let pairs: std::collections::HashSet<&[u8]> = seq.windows(2).collect();
    assert_eq!(pairs.len(), 256);
}

// ========== Round trips ==========

#[tokio::test]
async fn test_text_roundtrip_single_layer() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let path = dir.path().join("notes.txt");

    let summary = roundtrip(&engine, &path, &sample_text(1000)).await;
    assert_eq!(summary.layers, 1);
    assert_eq!(summary.original_len, 1000);
    // 125 records of 56 bits plus a 16-bit length prefix.
    assert_eq!(summary.compressed_len, 877);
    assert!(summary.ratio() < 1.0);
    assert_eq!(
        summary.artifact.file_name().unwrap().to_str().unwrap(),
        "notes-317c747874-.lid"
    );
    assert_eq!(file_names(dir.path()), vec!["notes-317c747874-.lid", "notes.txt"]);
}

#[tokio::test]
async fn test_min_layers_forces_growth() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_over(vec![all_pairs()], CompressionConfig { min_layers: 3, ..config(17) });
    let path = dir.path().join("blob.bin");
    let data: Vec<u8> = (0..200u32).map(|i| (i * 37 % 251) as u8).collect();

    let summary = roundtrip(&engine, &path, &data).await;
    assert_eq!(summary.layers, 3);
    assert!(summary.compressed_len > data.len() as u64);
    assert_eq!(file_names(dir.path()), vec!["blob-337c62696e-.lid", "blob.bin"]);
}

#[tokio::test]
async fn test_max_layers_caps_floor() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CompressionConfig { min_layers: 2, max_layers: 2, ..config(17) };
    let (engine, _) = engine_over(vec![all_pairs()], cfg);
    let summary = roundtrip(&engine, &dir.path().join("a.bin"), &[9u8; 40]).await;
    assert_eq!(summary.layers, 2);
}

#[tokio::test]
async fn test_stops_after_first_growing_layer() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_over(vec![all_pairs()], config(17));
    let data: Vec<u8> = (0..=255).collect();
    let summary = roundtrip(&engine, &dir.path().join("bytes.bin"), &data).await;
    assert_eq!(summary.layers, 1);
    // 32 records of 76 bits plus a 16-bit prefix.
    assert_eq!(summary.compressed_len, 306);
}

#[tokio::test]
async fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_over(vec![], config(12));
    let summary = roundtrip(&engine, &dir.path().join("empty.dat"), &[]).await;
    assert_eq!(summary.layers, 1);
    assert_eq!(summary.compressed_len, 1);
    assert_eq!(summary.ratio(), 1.0);
}

#[tokio::test]
async fn test_trailing_zeros_survive() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_over(vec![all_pairs()], CompressionConfig { max_layers: 1, ..config(17) });
    let data = [0xAB, 0xCD, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    roundtrip(&engine, &dir.path().join("z.bin"), &data).await;
}

#[tokio::test]
async fn test_odd_lengths() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    for len in [1, 2, 3, 7, 9, 15, 17] {
        roundtrip(&engine, &dir.path().join(format!("odd{len}.txt")), &sample_text(len)).await;
    }
}

#[tokio::test]
async fn test_file_without_extension() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let summary = roundtrip(&engine, &dir.path().join("README"), &sample_text(64)).await;
    assert_eq!(summary.artifact.file_name().unwrap().to_str().unwrap(), "README-317c-.lid");
}

// ========== Failures ==========

#[tokio::test]
async fn test_unmatchable_chunk_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_over(vec![vec![0u8; 16]], config(12));
    let path = dir.path().join("mixed.bin");
    let mut data = vec![0u8; 8];
    data.extend_from_slice(b"xyzxyzxy");
    write(&path, &data).await;

    let err = engine.compress(&path, &NoProgress).await.unwrap_err();
    assert!(matches!(
        err,
        LidError::UnmatchableChunk { layer: 1, offset: 8, best_block: None, best_matched: 0, batches: 4 }
    ));
    assert_eq!(file_names(dir.path()), vec!["mixed.bin"]);
    assert_eq!(read(&path).await, data);
}

#[tokio::test]
async fn test_failure_in_later_layer_removes_earlier_layers() {
    let dir = tempfile::tempdir().unwrap();
    // Layer 1 shrinks, so layer 2 is attempted on binary output the
    // text-only dictionary cannot cover.
    let engine = text_engine(config(12));
    let path = dir.path().join("notes.txt");
    write(&path, &sample_text(1000)).await;

    let err = engine.compress(&path, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LidError::UnmatchableChunk { layer: 2, .. }));
    assert_eq!(file_names(dir.path()), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_unrestorable_names_rejected_before_any_layer() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    for name in ["data.b|c", "data."] {
        let path = dir.path().join(name);
        write(&path, &sample_text(64)).await;
        let err = engine.compress(&path, &NoProgress).await.unwrap_err();
        assert!(matches!(err, LidError::Storage(_)), "name {name}");
    }
    assert_eq!(file_names(dir.path()), vec!["data.", "data.b|c"]);
}

#[tokio::test]
async fn test_dashed_extension_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let summary = roundtrip(&engine, &dir.path().join("data.b-c"), &sample_text(64)).await;
    assert_eq!(summary.artifact.file_name().unwrap().to_str().unwrap(), "data-317c622d63-.lid");
}

#[tokio::test]
async fn test_stale_layer_files_removed() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let path = dir.path().join("doc.txt");
    write(&path, &sample_text(100)).await;
    write(&dir.path().join("doc.L1.lid"), b"junk").await;
    write(&dir.path().join("doc.L7.lid"), b"junk").await;
    write(&dir.path().join("other.L1.lid"), b"keep").await;

    engine.compress(&path, &NoProgress).await.unwrap();
    assert_eq!(
        file_names(dir.path()),
        vec!["doc-317c747874-.lid", "doc.txt", "other.L1.lid"]
    );
}

#[tokio::test]
async fn test_decompress_rejects_unknown_name() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(config(12));
    let path = dir.path().join("plain.lid");
    write(&path, &[0]).await;
    let err = engine.decompress(&path, &NoProgress).await.unwrap_err();
    assert!(err.is_format_error());
}

#[tokio::test]
async fn test_decompress_truncated_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let path = dir.path().join("notes.txt");
    write(&path, &sample_text(400)).await;
    let summary = engine.compress(&path, &NoProgress).await.unwrap();

    let bytes = read(&summary.artifact).await;
    write(&summary.artifact, &bytes[..bytes.len() / 2]).await;
    tokio::fs::remove_file(&path).await.unwrap();

    let err = engine.decompress(&summary.artifact, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LidError::CorruptArtifact(_)));
    assert_eq!(file_names(dir.path()), vec!["notes-317c747874-.lid"]);
}

#[tokio::test]
async fn test_decompress_unknown_block() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(config(12));
    // One layer, no extension: length 8, block 5, four zero offsets.
    let artifact = dir.path().join("x-317c-.lid");
    write(&artifact, &[0x08, 0x05, 0, 0, 0, 0, 0, 0]).await;

    let err = engine.decompress(&artifact, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LidError::BlockUnavailable { index: 5, .. }));
    assert_eq!(file_names(dir.path()), vec!["x-317c-.lid"]);
}

// ========== Block availability ==========

#[tokio::test]
async fn test_decompress_fetches_missing_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CompressionConfig { max_layers: 1, ..config(12) };
    let path = dir.path().join("notes.txt");
    write(&path, &sample_text(300)).await;
    let summary = text_engine(cfg.clone()).compress(&path, &NoProgress).await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    let store = Arc::new(MemoryBlockStore::new());
    let source = Arc::new(StaticBlockSource::new(vec![de_bruijn(TEXT_ALPHABET)]));
    let cache = DictionaryCache::new(store.clone(), Arc::new(RawExpander), cfg.dictionary_size(), 16)
        .unwrap()
        .with_source(source);
    let engine = CompressionEngine::new(cfg, Arc::new(cache)).unwrap();

    let restored = engine.decompress(&summary.artifact, &NoProgress).await.unwrap();
    assert_eq!(read(&restored).await, sample_text(300));
    assert!(store.raw_block(0).await.unwrap().is_some());
}

#[tokio::test]
async fn test_file_store_backed_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    tokio::fs::create_dir(&work).await.unwrap();

    let store = Arc::new(FileBlockStore::open(dir.path().join("chain")).await.unwrap());
    store.put_raw_block(lid_core::Block::new(0, de_bruijn(TEXT_ALPHABET))).await.unwrap();
    let cfg = CompressionConfig { max_layers: 1, ..config(12) };
    let cache = DictionaryCache::new(store.clone(), Arc::new(RawExpander), cfg.dictionary_size(), 16).unwrap();
    let engine = CompressionEngine::new(cfg, Arc::new(cache)).unwrap();

    roundtrip(&engine, &work.join("notes.txt"), &sample_text(500)).await;
    assert_eq!(store.expanded_hash(0).await.unwrap().unwrap().len(), 4096);
    assert!(dir.path().join("chain/dict/0.dict").exists());
}

// ========== Engine construction ==========

#[tokio::test]
async fn test_engine_rejects_mismatched_cache() {
    let store = Arc::new(MemoryBlockStore::new());
    let cache = DictionaryCache::new(store, Arc::new(RawExpander), 1 << 10, 16).unwrap();
    let err = CompressionEngine::new(config(12), Arc::new(cache)).err().unwrap();
    assert!(matches!(err, LidError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_engine_rejects_invalid_config() {
    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    let cfg = CompressionConfig { min_layers: 3, max_layers: 2, ..config(12) };
    assert!(CompressionEngine::with_store(cfg, store, None).is_err());
}

#[tokio::test]
async fn test_hash_chain_engine_empty_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::with_blocks(vec![b"genesis".to_vec()]));
    let engine = CompressionEngine::with_store(config(12), store.clone(), None).unwrap();
    roundtrip(&engine, &dir.path().join("e.txt"), &[]).await;
    // Preload expanded the only block.
    assert_eq!(store.expanded_hash(0).await.unwrap().unwrap().len(), 4096);
}

// ========== Progress ==========

#[tokio::test]
async fn test_progress_events() {
    let dir = tempfile::tempdir().unwrap();
    let engine = text_engine(CompressionConfig { max_layers: 1, ..config(12) });
    let path = dir.path().join("notes.txt");
    write(&path, &sample_text(80)).await;

    let recorder = Recorder::default();
    let summary = engine.compress(&path, &recorder).await.unwrap();
    let messages = recorder.messages();
    assert_eq!(messages.first().map(String::as_str), Some("removing old files"));
    assert!(messages.iter().any(|m| m == "expanding hashes"));
    assert_eq!(messages.iter().filter(|m| *m == "Compressing...").count(), 10);
    assert_eq!(messages.last().map(String::as_str), Some("compressed"));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::fs::remove_file(&path).await.unwrap();
    engine.decompress(&summary.artifact, &ChannelProgress(tx)).await.unwrap();
    let mut last = None;
    let mut decoded = 0;
    while let Ok(p) = rx.try_recv() {
        if p.message == "Decompressing..." {
            decoded += 1;
            assert_eq!(p.layer, 1);
        }
        last = Some(p);
    }
    assert_eq!(decoded, 10);
    let last = last.unwrap();
    assert_eq!(last.message, "decompressed");
    assert_eq!(last.percentage(), 100.0);
}
