//! Cursor management, move, compact and prewrite

use atlasbytes::store::ElasticStore;
use atlasbytes::{Bytes, BytesError, MemoryBytes};

use crate::{assert_invariant, init_tracing};

// =============================================================================
// Helper Functions
// =============================================================================

fn text(bytes: &MemoryBytes) -> String {
    String::from_utf8(bytes.to_vec().unwrap()).unwrap()
}

fn buffer_with(content: &str) -> MemoryBytes {
    let mut bytes = MemoryBytes::elastic_heap(64).unwrap();
    bytes.write_slice(content.as_bytes()).unwrap();
    bytes
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_invariant_holds_after_every_cursor_call() {
    init_tracing();
    let mut b = MemoryBytes::fixed_native(128).unwrap();
    assert_invariant(&b);

    b.write_slice(b"0123456789").unwrap();
    assert_invariant(&b);
    b.read_skip(4).unwrap();
    assert_invariant(&b);
    b.set_write_limit(64).unwrap();
    assert_invariant(&b);
    b.set_write_position(2).unwrap();
    assert_invariant(&b);
    assert_eq!(b.read_position(), 2);
    b.write_skip(20).unwrap();
    assert_invariant(&b);
    b.read_position_remaining(5, 10).unwrap();
    assert_invariant(&b);
    assert_eq!(b.read_limit(), 15);
    b.clear_and_pad(32).unwrap();
    assert_invariant(&b);
    b.clear().unwrap();
    assert_invariant(&b);
    assert_eq!(b.write_limit(), 128);
}

#[test]
fn test_rejected_calls_leave_state_untouched() {
    let mut b = MemoryBytes::fixed_heap(16).unwrap();
    b.write_slice(b"abcd").unwrap();
    b.read_skip(1).unwrap();

    assert!(b.set_read_position(5).unwrap_err().is_underflow());
    assert!(b.set_write_position(17).unwrap_err().is_overflow());
    assert!(b.read_skip(10).unwrap_err().is_underflow());
    assert!(b.write_skip(13).unwrap_err().is_overflow());
    assert!(b.clear_and_pad(17).unwrap_err().is_overflow());

    assert_eq!(b.read_position(), 1);
    assert_eq!(b.write_position(), 4);
    assert_eq!(b.write_limit(), 16);
}

#[test]
fn test_negative_offset_is_invalid_argument() {
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    let err = b.set_read_position(-1i64 as u64).unwrap_err();
    assert!(matches!(err, BytesError::InvalidArgument(_)));
    let err = b.move_bytes(0, -3i64 as u64, 1).unwrap_err();
    assert!(matches!(err, BytesError::InvalidArgument(_)));
}

#[test]
fn test_write_limit_read_limit_scenario() {
    let mut b = Bytes::with_store(ElasticStore::elastic_heap(120).unwrap());
    b.write_8bit("Test me again").unwrap();
    b.set_write_limit(b.read_limit()).unwrap();
    assert_eq!(b.read_8bit().unwrap().as_deref(), Some("Test me again"));
    assert!(b.write_u8(0).unwrap_err().is_overflow());
}

// =============================================================================
// Move Tests
// =============================================================================

#[test]
fn test_move_within_hello_world() {
    let mut b = buffer_with("Hello World");
    b.move_bytes(3, 1, 3).unwrap();
    assert_eq!(text(&b), "Hlo o World");
    b.move_bytes(3, 5, 3).unwrap();
    assert_eq!(text(&b), "Hlo o o rld");
}

#[test]
fn test_move_overlapping_forward_and_back() {
    let mut b = buffer_with("0123456789abcdefg");
    b.move_bytes(1, 3, 10).unwrap();
    assert_eq!(text(&b), "012123456789adefg");

    let mut b = buffer_with("0123456789abcdefg");
    b.move_bytes(3, 1, 10).unwrap();
    assert_eq!(text(&b), "03456789abcbcdefg");
}

#[test]
fn test_move_leaves_cursors_alone() {
    let mut b = buffer_with("abcdef");
    b.read_skip(2).unwrap();
    b.move_bytes(0, 3, 3).unwrap();
    assert_eq!(b.read_position(), 2);
    assert_eq!(b.write_position(), 6);
    assert_eq!(text(&b), "cabc");
}

#[test]
fn test_move_past_write_limit_overflows() {
    let mut b = MemoryBytes::fixed_heap(8).unwrap();
    b.write_slice(b"abcdefgh").unwrap();
    assert!(b.move_bytes(0, 4, 5).unwrap_err().is_overflow());
}

// =============================================================================
// Compact Tests
// =============================================================================

#[test]
fn test_compact_keeps_unread_tail() {
    let mut b = buffer_with("Hello World");
    b.read_i64().unwrap();
    b.compact().unwrap();
    assert_eq!(b.read_position(), 0);
    assert_eq!(b.write_position(), 3);
    assert_eq!(text(&b), "rld");
    assert_invariant(&b);
}

#[test]
fn test_compact_is_noop_when_nothing_consumed_or_left() {
    let mut b = buffer_with("abc");
    b.compact().unwrap();
    assert_eq!(b.write_position(), 3);

    b.read_skip(3).unwrap();
    b.compact().unwrap();
    assert_eq!(b.read_position(), 3);
}

// =============================================================================
// Prewrite Tests
// =============================================================================

#[test]
fn test_prewrite_builds_header_in_front() {
    let mut b = MemoryBytes::elastic_heap(64).unwrap();
    b.clear_and_pad(16).unwrap();
    b.write_slice(b"World").unwrap();
    b.prewrite_slice(b"Hello ").unwrap();
    assert_eq!(text(&b), "Hello World");

    b.prewrite_i16(0x0B).unwrap();
    assert_eq!(b.read_i16().unwrap(), 0x0B);
    assert_eq!(text(&b), "Hello World");
}

#[test]
fn test_prewrite_before_start_overflows() {
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    b.clear_and_pad(2).unwrap();
    assert!(b.prewrite_i32(1).unwrap_err().is_overflow());
    assert_eq!(b.read_position(), 2);
}

// =============================================================================
// Lenient and Growth Tests
// =============================================================================

#[test]
fn test_lenient_reads_return_defaults_without_moving() {
    let mut b = buffer_with("ab");
    b.set_lenient(true);
    b.read_u8().unwrap();
    assert_eq!(b.read_i32().unwrap(), 0);
    assert_eq!(b.read_f64().unwrap(), 0.0);
    assert_eq!(b.read_position(), 1);

    b.read_skip(10).unwrap();
    assert_eq!(b.read_position(), 2);
}

#[test]
fn test_strict_read_past_end_underflows() {
    let mut b = buffer_with("ab");
    assert!(b.read_i32().unwrap_err().is_underflow());
    assert_eq!(b.read_position(), 0);
}

#[test]
fn test_elastic_growth_keeps_contents() {
    init_tracing();
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
    b.write_slice(&data).unwrap();

    assert!(b.real_capacity() >= 10_000);
    assert_eq!(b.ref_count(), 1);
    assert_eq!(b.to_vec().unwrap(), data);
    assert_invariant(&b);
}

#[test]
fn test_fixed_buffer_does_not_grow() {
    let mut b = MemoryBytes::fixed_native(8).unwrap();
    b.write_i64(1).unwrap();
    assert!(b.write_u8(1).unwrap_err().is_overflow());
    assert_eq!(b.capacity(), 8);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_released_buffer_refuses_access() {
    let mut b = buffer_with("gone");
    b.release().unwrap();
    assert!(b.is_released());
    assert!(matches!(b.read_u8(), Err(BytesError::Released(_))));
}

#[test]
fn test_second_release_is_reported() {
    let mut b = MemoryBytes::elastic_native(16).unwrap();
    b.write_u32(7).unwrap();
    b.release().unwrap();
    assert!(matches!(b.release(), Err(BytesError::Released(_))));

    let mut c = MemoryBytes::fixed_heap(8).unwrap();
    c.close().unwrap();
    assert!(matches!(c.release(), Err(BytesError::Released(_))));
}

#[test]
fn test_checksums_cover_requested_range() {
    let b = &mut buffer_with("123456789");
    assert_eq!(b.crc32(0, 9).unwrap(), 0xCBF4_3926);
    assert_eq!(b.byte_check_sum(0, 3).unwrap(), b'1'.wrapping_add(b'2').wrapping_add(b'3'));
    assert!(b.crc32(0, 10).unwrap_err().is_underflow());
}
