//! End-to-end service test: init, lookups, hot reload, stop
//!
//! The service is process-wide, so the whole lifecycle runs inside one
//! test function.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use geodb::SnapshotBuilder;
use serde_json::json;

fn write_snapshot(path: &std::path::Path, build: impl FnOnce(&mut SnapshotBuilder)) {
    let mut builder = SnapshotBuilder::new();
    build(&mut builder);
    let bytes = builder.build().to_bytes();
    // Write to a temp file then atomically rename, the way the offline
    // builder publishes snapshots
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).unwrap();
    fs::rename(&tmp, path).unwrap();
}

#[test]
fn service_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("geodb.dat");

    // A failed init leaves the service untouched
    let bad = json!({"geodb": {"file": db_path.to_str().unwrap()}});
    assert!(geodb::init(&bad).is_err());
    assert!(geodb::get_ipv4_str("10.1.2.3").is_empty());

    write_snapshot(&db_path, |b| {
        b.add_range_v4(0x0A000000, 0x0AFFFFFF, 840, 0, 0, "USA", "", "");
    });

    let config = json!({
        "geodb": {
            "file": db_path.to_str().unwrap(),
            "check_for_update_timeout": 2.0,
        }
    });
    geodb::init(&config).unwrap();

    // Basic hits and misses around the range boundaries
    assert_eq!(&*geodb::get_ipv4_str("10.1.2.3").country_key, "USA");
    assert!(geodb::get_ipv4_str("9.255.255.255").is_empty());
    assert!(geodb::get_ipv4_str("11.0.0.0").is_empty());

    // get_ip dispatches by syntax
    assert_eq!(&*geodb::get_ip("10.1.2.3").country_key, "USA");
    assert!(geodb::get_ip("::1").is_empty());
    assert!(geodb::get_ip("not an address").is_empty());

    // A second init is a no-op: still serving the same snapshot
    let other = json!({"geodb": {"file": "/nonexistent/geodb.dat"}});
    geodb::init(&other).unwrap();
    assert_eq!(&*geodb::get_ipv4_str("10.1.2.3").country_key, "USA");

    // Hold a handle across the swap
    let old = geodb::snapshot().unwrap();

    // Publish a new snapshot with different contents
    let (v6_from, v6_to) = geodb::net6_to_range("2001:db8::/32");
    write_snapshot(&db_path, |b| {
        b.add_range_v4(0x0A000000, 0x0AFFFFFF, 250, 0, 0, "FRA", "", "");
        b.add_range_v6(v6_from, v6_to, 276, 0, 0, "DEU", "", "");
    });

    // The watcher needs one tick to notice and one to confirm quiescence
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        if &*geodb::get_ipv4_str("10.1.2.3").country_key == "FRA" {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "watcher did not pick up the new snapshot"
        );
        thread::sleep(Duration::from_millis(200));
    }
    assert_eq!(&*geodb::get_ipv6_str("2001:db8::1").country_key, "DEU");

    // The pre-swap handle still observes the old snapshot
    assert_eq!(&*old.find_v4(0x0A010203).country_key, "USA");
    drop(old);

    // After stop, reads return empty
    geodb::stop();
    assert!(geodb::get_ipv4_str("10.1.2.3").is_empty());
    assert!(geodb::snapshot().is_none());

    // Re-init with dont_load: lookups stay empty even though the file exists
    let config = json!({
        "geodb": {
            "file": db_path.to_str().unwrap(),
            "dont_load": true,
        }
    });
    geodb::init(&config).unwrap();
    assert!(geodb::get_ipv4_str("10.1.2.3").is_empty());
    geodb::stop();
}
