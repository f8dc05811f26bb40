//! Process-wide lookup service with snapshot hot-reload
//!
//! The published snapshot lives in a lock-free `ArcSwapOption`; readers
//! grab an `Arc` handle, look up, and drop it. The watcher thread is the
//! only writer: replacement is a single atomic store, and an old snapshot
//! is freed once the last in-flight reader releases its handle.
//!
//! # Watcher
//!
//! The watcher polls the snapshot file's mtime on a fixed interval. A
//! change moves it from `Idle` to `Pending`; only when the mtime holds
//! still for a full further tick does it load and publish. The two-tick
//! quiescence check tolerates writers that rewrite the file in place;
//! with a rename-based writer the second tick simply confirms the rename.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use arc_swap::ArcSwapOption;
use log::error;
use serde_json::Value;

use crate::config::GeoDbConfig;
use crate::error::Result;
use crate::ip;
use crate::snapshot::{Element, Snapshot};

/// Published snapshot handle; the only state shared with readers
static CURRENT: LazyLock<ArcSwapOption<Snapshot>> = LazyLock::new(|| ArcSwapOption::new(None));

/// Control block owned by `init`/`stop`
static CONTROL: Mutex<Option<ServiceControl>> = Mutex::new(None);

struct ServiceControl {
    shutdown_tx: mpsc::Sender<()>,
    watcher: Option<JoinHandle<()>>,
}

/// Start the service from a parsed JSON config document
///
/// Loads the initial snapshot (unless `geodb.dont_load` is set) and spawns
/// the watcher thread. Calling `init` on an already-running service is a
/// no-op.
pub fn init(config: &Value) -> Result<()> {
    let mut control = CONTROL.lock().unwrap();
    if control.is_some() {
        return Ok(());
    }
    let config = GeoDbConfig::from_json(config)?;
    if !config.dont_load {
        let snapshot = Snapshot::load(&config.file)?;
        CURRENT.store(Some(Arc::new(snapshot)));
    }
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let watcher = thread::Builder::new()
        .name("geodb-watcher".into())
        .spawn(move || watcher_loop(&config, &shutdown_rx))?;
    *control = Some(ServiceControl {
        shutdown_tx,
        watcher: Some(watcher),
    });
    Ok(())
}

/// Stop the watcher and drop the published snapshot
///
/// Blocks until the watcher has joined. Reads issued after `stop` return
/// the empty element; reads already in flight complete against the
/// snapshot handle they hold.
pub fn stop() {
    let mut control = CONTROL.lock().unwrap();
    if let Some(mut ctl) = control.take() {
        let _ = ctl.shutdown_tx.send(());
        if let Some(handle) = ctl.watcher.take() {
            let _ = handle.join();
        }
    }
    CURRENT.store(None);
}

/// Handle to the currently published snapshot, if any
///
/// Useful when several lookups must observe the same version.
pub fn snapshot() -> Option<Arc<Snapshot>> {
    CURRENT.load_full()
}

/// Look up an IPv4 address
pub fn get_ipv4(ip: u32) -> Element {
    match CURRENT.load_full() {
        Some(snapshot) => snapshot.find_v4(ip),
        None => Element::default(),
    }
}

/// Look up an IPv4 address given in dotted-quad form
pub fn get_ipv4_str(s: &str) -> Element {
    get_ipv4(ip::ipv4_from_str(s))
}

/// Look up an IPv6 address
pub fn get_ipv6(ip: u128) -> Element {
    match CURRENT.load_full() {
        Some(snapshot) => snapshot.find_v6(ip),
        None => Element::default(),
    }
}

/// Look up an IPv6 address given in textual form
pub fn get_ipv6_str(s: &str) -> Element {
    get_ipv6(ip::ipv6_from_str(s))
}

/// Look up an address of either family; non-address strings miss
pub fn get_ip(s: &str) -> Element {
    if ip::check_ipv4(s) {
        get_ipv4_str(s)
    } else if ip::check_ipv6(s) {
        get_ipv6_str(s)
    } else {
        Element::default()
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

enum WatchState {
    Idle,
    Pending,
}

fn watcher_loop(config: &GeoDbConfig, shutdown_rx: &mpsc::Receiver<()>) {
    let mut state = WatchState::Idle;
    let mut last_modified = file_mtime(&config.file);
    loop {
        match shutdown_rx.recv_timeout(config.check_for_update_timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if config.dont_load {
            continue;
        }
        let modified = file_mtime(&config.file);
        match state {
            WatchState::Idle => {
                if modified > last_modified {
                    last_modified = modified;
                    state = WatchState::Pending;
                }
            }
            WatchState::Pending => {
                if modified == last_modified {
                    // File has quiesced; anything failing here keeps the
                    // current snapshot and waits for the next change
                    match Snapshot::load(&config.file) {
                        Ok(snapshot) => CURRENT.store(Some(Arc::new(snapshot))),
                        Err(e) => error!("can't reload {}: {}", config.file.display(), e),
                    }
                    state = WatchState::Idle;
                }
                last_modified = modified;
            }
        }
    }
}
