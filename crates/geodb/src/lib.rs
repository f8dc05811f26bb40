//! Geodb - In-Process IP Geolocation Lookup
//!
//! Geodb answers "which country / state / city does this IP belong to?"
//! over a precompiled snapshot file. The snapshot is produced offline by
//! `geodb-builder`, memory-mapped here at load time, and hot-swapped when
//! the file changes on disk. Readers never block and never fail.
//!
//! # Quick Start
//!
//! ```no_run
//! let config: serde_json::Value = serde_json::from_str(r#"
//!     { "geodb": { "file": "geodb.dat", "check_for_update_timeout": 5.0 } }
//! "#)?;
//!
//! geodb::init(&config)?;
//!
//! let el = geodb::get_ip("10.1.2.3");
//! if !el.is_empty() {
//!     println!("{} / {} / {}", el.country_key, el.state_key, el.city_name);
//! }
//!
//! geodb::stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! geodb-builder {SQL + MaxMind CSV}
//!         ↓ writes
//! snapshot file (geodb-format container)
//!         ↓ mmap + parse
//! Snapshot: sorted range tables + interned labels
//!         ↓ ArcSwap publish
//! get_ipv4 / get_ipv6 / get_ip   (lock-free readers)
//! ```
//!
//! A background watcher polls the snapshot file's mtime and republishes
//! atomically once the file has held still for a full poll interval.
//! Lookup misses (including "no snapshot loaded" and unparseable input)
//! come back as the empty [`Element`], never as an error.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Service configuration (the `geodb` JSON section)
pub mod config;
/// Error types for geodb operations
pub mod error;
/// IP parsing, formatting and CIDR expansion helpers
pub mod ip;
/// Immutable snapshot and its builder
pub mod snapshot;

mod service;

pub use config::GeoDbConfig;
pub use error::{GeoDbError, Result};
pub use ip::{
    check_ipv4, check_ipv6, ipv4_from_str, ipv4_to_string, ipv6_from_str, ipv6_to_string,
    net4_to_range, net6_to_range,
};
pub use service::{get_ip, get_ipv4, get_ipv4_str, get_ipv6, get_ipv6_str, init, snapshot, stop};
pub use snapshot::{Element, Snapshot, SnapshotBuilder};
