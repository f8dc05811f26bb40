// Thread-safety tests for Snapshot
use geodb::{Snapshot, SnapshotBuilder};
use std::sync::Arc;
use std::thread;

#[test]
fn snapshot_is_send_sync() {
    // Compile-time assertion that Snapshot is Send + Sync
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    assert_send::<Snapshot>();
    assert_sync::<Snapshot>();
}

#[test]
fn concurrent_lookups_see_consistent_elements() {
    let mut builder = SnapshotBuilder::new();
    for i in 0..64u32 {
        let from = i << 24;
        let to = from | 0x00FF_FFFF;
        builder.add_range_v4(from, to, i + 1, 0, 0, "USA", "CA", "San Jose");
    }
    let snapshot = Arc::new(builder.build());

    let handles: Vec<_> = (0..8u32)
        .map(|thread_id| {
            let snapshot = Arc::clone(&snapshot);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    let block = thread_id * 8 + i % 8;
                    let ip = (block << 24) | i;
                    let el = snapshot.find_v4(ip);
                    assert_eq!(el.country_id, block + 1);
                    assert_eq!(&*el.country_key, "USA");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
