//! Chunk transparency and lifecycle

use atlasbytes::{BytesError, Config, MappedBytes, MappedFile, ReferenceCounted};

use crate::{chunked, init_tracing, pattern, setup_temp_file};

const CHUNK: u64 = 4096;

// =============================================================================
// Transparency Tests
// =============================================================================

#[test]
fn test_three_chunks_written_then_reread_fresh() {
    init_tracing();
    let (_dir, path) = setup_temp_file("three.dat");
    let data = pattern(3 * CHUNK as usize);

    {
        let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 256)).unwrap();
        bytes.write_slice(&data).unwrap();
        assert!(bytes.chunk_transitions() >= 2);
        bytes.sync().unwrap();
    }

    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 256)).unwrap();
    bytes.set_read_limit(data.len() as u64).unwrap();
    let mut out = vec![0u8; data.len()];
    bytes.read_exact(&mut out).unwrap();
    assert_eq!(out, data);
    assert!(bytes.chunk_transitions() >= 2);
}

#[test]
fn test_different_chunk_settings_read_the_same_bytes() {
    let (_dir, path) = setup_temp_file("settings.dat");
    let data = pattern(5 * CHUNK as usize + 123);
    {
        let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 0)).unwrap();
        bytes.write_slice(&data).unwrap();
    }

    for (chunk, overlap) in [(CHUNK, 0), (CHUNK, 1024), (2 * CHUNK, 512), (64 * CHUNK, CHUNK)] {
        let mut bytes = MappedBytes::open(&path, &chunked(chunk, overlap)).unwrap();
        bytes.set_read_limit(data.len() as u64).unwrap();
        assert_eq!(bytes.to_vec().unwrap(), data, "chunk {} overlap {}", chunk, overlap);
    }
}

#[test]
fn test_values_straddling_a_boundary() {
    let (_dir, path) = setup_temp_file("straddle.dat");
    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 0)).unwrap();

    bytes.write_i64_at(CHUNK - 3, 0x0102_0304_0506_0708).unwrap();
    bytes.write_u32_at(2 * CHUNK - 1, 0xDEAD_BEEF).unwrap();
    bytes.set_read_limit(3 * CHUNK).unwrap();

    assert_eq!(bytes.read_i64_at(CHUNK - 3).unwrap(), 0x0102_0304_0506_0708);
    assert_eq!(bytes.read_u32_at(2 * CHUNK - 1).unwrap(), 0xDEAD_BEEF);
    assert_eq!(bytes.read_u8_at(CHUNK).unwrap(), 0x05);
}

#[test]
fn test_sequential_codecs_across_chunks() {
    let (_dir, path) = setup_temp_file("codecs.dat");
    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 64)).unwrap();

    for i in 0..2000i64 {
        bytes.write_stop_bit(i * 1_000_003).unwrap();
        bytes.write_8bit("tick").unwrap();
    }
    for i in 0..2000i64 {
        assert_eq!(bytes.read_stop_bit().unwrap(), i * 1_000_003);
        assert_eq!(bytes.read_8bit().unwrap().as_deref(), Some("tick"));
    }
    assert!(bytes.chunk_transitions() >= 2);
}

#[test]
fn test_move_and_compact_across_chunks() {
    let (_dir, path) = setup_temp_file("move.dat");
    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 0)).unwrap();
    let data = pattern(3 * CHUNK as usize);
    bytes.write_slice(&data).unwrap();

    bytes.read_skip(CHUNK as i64 + 10).unwrap();
    bytes.compact().unwrap();
    assert_eq!(bytes.read_position(), 0);
    assert_eq!(bytes.to_vec().unwrap(), data[CHUNK as usize + 10..].to_vec());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_buffers_share_one_file() {
    let (_dir, path) = setup_temp_file("shared.dat");
    let config = chunked(CHUNK, 128);
    let file = MappedFile::open(&path, &config).unwrap();

    let mut writer = MappedBytes::from_file(&file, &config).unwrap();
    let mut reader = MappedBytes::from_file(&file, &config).unwrap();
    assert_eq!(file.ref_count(), 3);

    writer.write_slice(b"shared view").unwrap();
    reader.set_read_limit(11).unwrap();
    assert_eq!(reader.to_vec().unwrap(), b"shared view".to_vec());
    assert_eq!(file.map_count(), 1);

    writer.release().unwrap();
    reader.release().unwrap();
    assert_eq!(file.ref_count(), 1);
    file.close().unwrap();
    assert!(file.is_released());
}

#[test]
fn test_closed_file_refuses_new_buffers() {
    let (_dir, path) = setup_temp_file("closed.dat");
    let config = chunked(CHUNK, 0);
    let file = MappedFile::open(&path, &config).unwrap();
    let mut bytes = MappedBytes::from_file(&file, &config).unwrap();
    file.close().unwrap();

    assert!(MappedBytes::from_file(&file, &config).is_err());
    bytes.write_u64_at(3 * CHUNK, 9).unwrap();
    assert_eq!(bytes.read_u64_at(3 * CHUNK).unwrap(), 9);
}

#[test]
fn test_released_buffer_refuses_access() {
    let (_dir, path) = setup_temp_file("released.dat");
    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 0)).unwrap();
    bytes.write_u8(1).unwrap();
    bytes.release().unwrap();
    assert!(matches!(bytes.read_u8(), Err(BytesError::Released(_))));
}

#[test]
fn test_second_release_is_reported() {
    let (_dir, path) = setup_temp_file("twice.dat");
    let mut bytes = MappedBytes::open(&path, &chunked(CHUNK, 0)).unwrap();
    bytes.write_u64_at(CHUNK, 5).unwrap();
    bytes.release().unwrap();
    assert!(bytes.mapped_file().is_released());

    assert!(matches!(bytes.release(), Err(BytesError::Released(_))));
    assert!(bytes.is_released());
}

#[test]
fn test_read_only_mapping_refuses_writes() {
    let (_dir, path) = setup_temp_file("ro.dat");
    let data = pattern(2 * CHUNK as usize + 7);
    std::fs::write(&path, &data).unwrap();

    let config = Config::builder()
        .chunk_size(CHUNK)
        .overlap_size(64)
        .read_only(true)
        .build();
    let mut bytes = MappedBytes::open(&path, &config).unwrap();
    assert_eq!(bytes.read_remaining(), data.len() as u64);

    let mut out = vec![0u8; data.len()];
    bytes.read_exact(&mut out).unwrap();
    assert_eq!(out, data);
    assert!(matches!(bytes.write_u8_at(0, 1), Err(BytesError::ReadOnly(_))));
}

#[test]
fn test_absolute_reads_past_end_of_read_only_file() {
    let (_dir, path) = setup_temp_file("short.dat");
    std::fs::write(&path, b"read only").unwrap();

    let config = Config::builder()
        .chunk_size(4096)
        .overlap_size(512)
        .read_only(true)
        .build();
    let mut bytes = MappedBytes::open(&path, &config).unwrap();
    assert_eq!(bytes.read_u8_at(0).unwrap(), b'r');

    assert!(bytes.read_u8_at(100).unwrap_err().is_underflow());
    assert!(bytes.read_u64_at(5).unwrap_err().is_underflow());
    assert!(bytes.read_u32_at(5000).unwrap_err().is_underflow());
    assert_eq!(bytes.read_u32_at(4).unwrap(), u32::from_le_bytes(*b" onl"));

    bytes.set_lenient(true);
    assert_eq!(bytes.read_u8_at(100).unwrap(), 0);
    assert_eq!(bytes.read_u64_at(5).unwrap(), 0);
    assert_eq!(bytes.read_position(), 0);
}

#[test]
fn test_write_past_mapped_capacity_overflows() {
    let (_dir, path) = setup_temp_file("cap.dat");
    let config = Config::builder()
        .chunk_size(CHUNK)
        .overlap_size(0)
        .mapped_capacity(2 * CHUNK)
        .build();
    let mut bytes = MappedBytes::open(&path, &config).unwrap();
    bytes.write_u64_at(2 * CHUNK - 8, 1).unwrap();
    assert!(bytes.write_u64_at(2 * CHUNK - 4, 1).unwrap_err().is_overflow());
}
