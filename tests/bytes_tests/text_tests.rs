//! Numbers as text: append and parse

use atlasbytes::decimal::NoDecimaliser;
use atlasbytes::{BytesError, MemoryBytes};

// =============================================================================
// Helper Functions
// =============================================================================

fn appended(f: impl FnOnce(&mut MemoryBytes)) -> String {
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    f(&mut b);
    String::from_utf8(b.to_vec().unwrap()).unwrap()
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_shortest_decimal() {
    assert_eq!(appended(|b| b.append_f64(0.1).unwrap()), "0.1");
    assert_eq!(appended(|b| b.append_f64(100.0).unwrap()), "100.0");
    assert_eq!(appended(|b| b.append_f64(-0.000125).unwrap()), "-0.000125");
    assert_eq!(appended(|b| b.append_f32(2.5).unwrap()), "2.5");
}

#[test]
fn test_append_large_float_uses_display() {
    assert_eq!(appended(|b| b.append_f64(1e20).unwrap()), "100000000000000000000");
    assert_eq!(appended(|b| b.append_f64(f64::NEG_INFINITY).unwrap()), "-inf");
}

#[test]
fn test_no_decimaliser_changes_only_the_route() {
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    b.set_decimaliser(&NoDecimaliser);
    b.append_f64(0.25).unwrap();
    assert_eq!(b.to_vec().unwrap(), b"0.25");
    assert_eq!(b.last_decimal_places(), 2);
}

// =============================================================================
// Parse Tests
// =============================================================================

#[test]
fn test_parse_sequence_of_numbers() {
    let mut b = MemoryBytes::elastic_heap(16).unwrap();
    for v in [0i64, -1, 42, i64::MAX, i64::MIN] {
        b.append_i64(v).unwrap();
        b.write_u8(b' ').unwrap();
    }
    for v in [0i64, -1, 42, i64::MAX, i64::MIN] {
        assert_eq!(b.parse_i64().unwrap(), v);
    }
    assert!(b.is_empty());
}

#[test]
fn test_parse_float_forms() {
    let mut b = MemoryBytes::from_slice(b"  1.5e3,-0.125 7").unwrap();
    assert_eq!(b.parse_f64().unwrap(), 1500.0);
    assert_eq!(b.parse_f64().unwrap(), -0.125);
    assert_eq!(b.last_decimal_places(), 3);
    assert_eq!(b.parse_f64().unwrap(), 7.0);
}

#[test]
fn test_parse_overflow_is_numeric_format() {
    let mut b = MemoryBytes::from_slice(b"9223372036854775808 ").unwrap();
    assert!(matches!(b.parse_i64(), Err(BytesError::NumericFormat(_))));
    assert_eq!(b.read_position(), 0);
}

#[test]
fn test_fixed_width_field_can_be_rewritten() {
    let mut b = MemoryBytes::elastic_heap(32).unwrap();
    b.write_slice(b"[          ]").unwrap();
    b.append_i64_at_fixed(1, 7, 10).unwrap();
    assert_eq!(b.to_vec().unwrap(), b"[0000000007]");
    b.append_i64_at_fixed(1, -12345, 10).unwrap();
    assert_eq!(b.to_vec().unwrap(), b"[-000012345]");
    assert_eq!(b.parse_i64_at(1).unwrap(), -12345);
}
