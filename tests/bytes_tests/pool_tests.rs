//! Scratch buffer pool

use atlasbytes::BytesPool;

#[test]
fn test_pooled_buffer_is_reused() {
    let pool = BytesPool::with_limits(64, 2, 1 << 16);
    let first_capacity = {
        let mut b = pool.acquire().unwrap();
        b.write_slice(&[1u8; 200]).unwrap();
        b.real_capacity()
    };
    assert_eq!(pool.available(), 1);

    let b = pool.acquire().unwrap();
    assert!(b.is_empty());
    assert_eq!(b.real_capacity(), first_capacity);
}

#[test]
fn test_pool_serves_other_threads() {
    let pool = BytesPool::new();
    crossbeam::scope(|s| {
        for t in 0..4u8 {
            let pool = &pool;
            s.spawn(move |_| {
                for _ in 0..50 {
                    let mut b = pool.acquire().unwrap();
                    b.write_u8(t).unwrap();
                    assert_eq!(b.read_u8().unwrap(), t);
                }
            });
        }
    })
    .unwrap();
    assert!(pool.available() >= 1);
    assert!(pool.available() <= 4);
}
