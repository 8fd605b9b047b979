//! Region memory lifetime

use std::sync::Arc;

use atlasbytes::store::{Region, RegionKind};
use atlasbytes::{BytesError, OwnerId, ReferenceCounted};

#[test]
fn test_region_frees_on_last_release() {
    let owner = OwnerId::new("region test");
    let reader = OwnerId::new("reader");
    let region = Region::native(64, owner).unwrap();
    assert_eq!(region.kind(), RegionKind::Native);

    region.write(0, b"live").unwrap();
    region.reserve(reader).unwrap();
    region.release(owner).unwrap();

    let mut out = [0u8; 4];
    region.read(0, &mut out).unwrap();
    assert_eq!(&out, b"live");

    region.release(reader).unwrap();
    assert!(region.is_released());
    assert!(matches!(region.read(0, &mut out), Err(BytesError::Released(_))));
}

#[test]
fn test_region_bounds_are_physical() {
    let owner = OwnerId::new("bounds");
    let region = Region::heap(16, owner).unwrap();
    assert!(region.write(12, &[0u8; 8]).unwrap_err().is_overflow());
    assert!(region.read(16, &mut [0u8; 1]).unwrap_err().is_underflow());
    region.write(8, &[1u8; 8]).unwrap();
    region.release(owner).unwrap();
}

#[test]
fn test_shared_region_across_threads() {
    let owner = OwnerId::new("shared");
    let region = Arc::new(Region::native(8 * 64, owner).unwrap());

    crossbeam::scope(|s| {
        for t in 0..8u64 {
            let region = Arc::clone(&region);
            s.spawn(move |_| {
                let me = OwnerId::new("thread");
                region.reserve(me).unwrap();
                for _ in 0..100 {
                    loop {
                        let mut buf = [0u8; 8];
                        region.read_volatile(t * 64, &mut buf).unwrap();
                        let current = i64::from_le_bytes(buf);
                        if region.compare_and_swap_i64(t * 64, current, current + 1).unwrap() {
                            break;
                        }
                    }
                }
                region.release(me).unwrap();
            });
        }
    })
    .unwrap();

    for t in 0..8u64 {
        let mut buf = [0u8; 8];
        region.read(t * 64, &mut buf).unwrap();
        assert_eq!(i64::from_le_bytes(buf), 100);
    }
    assert_eq!(region.ref_count(), 1);
    region.release(owner).unwrap();
}
