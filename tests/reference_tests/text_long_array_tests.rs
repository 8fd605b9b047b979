//! TextLongArray over heap and mapped buffers

use atlasbytes::{BytesError, Config, MappedBytes, MappedFile, MemoryBytes, TextLongArray};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config() -> Config {
    Config::builder()
        .chunk_size(4096)
        .overlap_size(256)
        .mapped_capacity(1 << 24)
        .build()
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_size_in_bytes_formula() {
    assert_eq!(TextLongArray::size_in_bytes(0), 92);
    assert_eq!(TextLongArray::size_in_bytes(1), 112);
    assert_eq!(TextLongArray::size_in_bytes(3), 92 + 3 * 20 + 2 * 2);
}

#[test]
fn test_huge_capacity_field_is_numeric_format() {
    let mut b = MemoryBytes::elastic_native(128).unwrap();
    let array = TextLongArray::write(&mut b, 2).unwrap();
    b.write_slice_at(27, i64::MAX.to_string().as_bytes()).unwrap();

    assert!(matches!(
        TextLongArray::peek_length(&mut b, 0),
        Err(BytesError::NumericFormat(_))
    ));
    assert!(matches!(
        TextLongArray::bind(&mut b, 0, array.len()),
        Err(BytesError::NumericFormat(_))
    ));
    assert_eq!(TextLongArray::size_in_bytes(u64::MAX), u64::MAX);
}

#[test]
fn test_empty_array_is_well_formed() {
    let mut b = MemoryBytes::elastic_native(16).unwrap();
    let array = TextLongArray::write(&mut b, 0).unwrap();
    assert!(array.is_empty());
    assert_eq!(array.len(), 92);
    assert!(b.to_vec().unwrap().ends_with(b"values: [  ] }\n"));
}

#[test]
fn test_array_persists_in_mapped_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("array.txt");
    let length = {
        let mut bytes = MappedBytes::open(&path, &config()).unwrap();
        let array = TextLongArray::write(&mut bytes, 200).unwrap();
        for i in 0..200 {
            array.set_value_at(&mut bytes, i, i as i64 * -3).unwrap();
        }
        array.set_max_used(&mut bytes, 200).unwrap();
        bytes.sync().unwrap();
        array.len()
    };
    assert!(length > 4096);

    let mut bytes = MappedBytes::open(&path, &config()).unwrap();
    bytes.set_read_limit(length).unwrap();
    let array = TextLongArray::bind(&mut bytes, 0, length).unwrap();
    assert_eq!(array.capacity(), 200);
    assert_eq!(array.used(&mut bytes).unwrap(), 200);
    for i in 0..200 {
        assert_eq!(array.get_value_at(&mut bytes, i).unwrap(), i as i64 * -3);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_compare_and_set_from_many_threads() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let file = MappedFile::open(dir.path().join("cas.txt"), &config).unwrap();

    let array = {
        let mut bytes = MappedBytes::from_file(&file, &config).unwrap();
        TextLongArray::write(&mut bytes, 4).unwrap()
    };

    crossbeam::scope(|s| {
        for t in 0..4u64 {
            let file = &file;
            let config = &config;
            s.spawn(move |_| {
                let mut bytes = MappedBytes::from_file(file, config).unwrap();
                bytes.set_read_limit(array.len()).unwrap();
                let mut done = 0;
                while done < 100 {
                    let current = array.get_volatile_value_at(&mut bytes, 0).unwrap();
                    if array.compare_and_set(&mut bytes, 0, current, current + 1).unwrap() {
                        done += 1;
                    }
                }
                array.set_max_used(&mut bytes, t + 1).unwrap();
            });
        }
    })
    .unwrap();

    let mut bytes = MappedBytes::from_file(&file, &config).unwrap();
    assert_eq!(array.get_value_at(&mut bytes, 0).unwrap(), 400);
    assert_eq!(array.used(&mut bytes).unwrap(), 4);
}
