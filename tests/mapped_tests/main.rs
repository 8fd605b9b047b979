//! Tests for chunk-mapped buffers
//!
//! These tests verify:
//! - Data written across chunk boundaries reads back identically
//! - Different chunk/overlap settings see the same file contents
//! - Concurrent chunk requests converge on a single mapping
//! - Read-only mappings refuse writes

mod chunk_tests;

use std::path::PathBuf;
use std::sync::Once;

use atlasbytes::Config;
use tempfile::TempDir;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Chunked config with a small chunk so tests cross boundaries quickly.
pub fn chunked(chunk_size: u64, overlap_size: u64) -> Config {
    Config::builder()
        .chunk_size(chunk_size)
        .overlap_size(overlap_size)
        .mapped_capacity(1 << 30)
        .build()
}

pub fn setup_temp_file(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}

/// Deterministic, non-repeating-per-chunk test pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 4096) % 251) as u8).collect()
}
