//! Immutable snapshot: sorted range tables plus interned labels
//!
//! A [`Snapshot`] is built once, by the offline builder or from a decoded
//! snapshot file, and never mutated afterwards, so any number of threads
//! may read it concurrently without synchronization.
//!
//! # Index
//!
//! Both tables are `Vec`s sorted by the range's `to` address. A point
//! lookup binary-searches for the smallest `to >= ip` and then checks
//! `from <= ip`. Ranges are disjoint, which makes the single ordered
//! probe sufficient and ties on `to` impossible.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use geodb_format::{Geo, Ipv4Range, Ipv6Range};
use log::info;
use memmap2::Mmap;

use crate::error::{GeoDbError, Result};

/// Location payload attached to a range
///
/// Labels are handles into the owning snapshot's intern pool: equal strings
/// within one snapshot share one allocation. Across snapshots handles are
/// unrelated; comparisons go through the string bytes, which is what
/// `PartialEq` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Catalogue country id, 0 when unknown
    pub country_id: u32,
    /// Catalogue state id, 0 when unknown
    pub state_id: u32,
    /// Catalogue city id, 0 when unknown
    pub city_id: u32,
    /// Three-letter country code
    pub country_key: Arc<str>,
    /// Subdivision code
    pub state_key: Arc<str>,
    /// English city name
    pub city_name: Arc<str>,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            country_id: 0,
            state_id: 0,
            city_id: 0,
            country_key: Arc::from(""),
            state_key: Arc::from(""),
            city_name: Arc::from(""),
        }
    }
}

impl Element {
    /// True for the "not found" element
    pub fn is_empty(&self) -> bool {
        self.country_id == 0
            && self.state_id == 0
            && self.city_id == 0
            && self.country_key.is_empty()
            && self.state_key.is_empty()
            && self.city_name.is_empty()
    }
}

#[derive(Debug, Clone)]
struct RangeV4 {
    from: u32,
    to: u32,
    el: Element,
}

#[derive(Debug, Clone)]
struct RangeV6 {
    from: u128,
    to: u128,
    el: Element,
}

/// Immutable range index serving point lookups
#[derive(Debug, Default)]
pub struct Snapshot {
    v4: Vec<RangeV4>,
    v6: Vec<RangeV6>,
}

impl Snapshot {
    /// Find the element covering an IPv4 address, or the empty element
    pub fn find_v4(&self, ip: u32) -> Element {
        let idx = self.v4.partition_point(|r| r.to < ip);
        match self.v4.get(idx) {
            Some(r) if r.from <= ip => r.el.clone(),
            _ => Element::default(),
        }
    }

    /// Find the element covering an IPv6 address, or the empty element
    pub fn find_v6(&self, ip: u128) -> Element {
        let idx = self.v6.partition_point(|r| r.to < ip);
        match self.v6.get(idx) {
            Some(r) if r.from <= ip => r.el.clone(),
            _ => Element::default(),
        }
    }

    /// Number of IPv4 ranges
    pub fn len_v4(&self) -> usize {
        self.v4.len()
    }

    /// Number of IPv6 ranges
    pub fn len_v6(&self) -> usize {
        self.v6.len()
    }

    /// Rebuild the snapshot from a decoded container message
    pub fn from_geo(geo: &Geo) -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        for r in &geo.ipsv4 {
            builder.add_range_v4(
                r.from,
                r.to,
                r.country_id,
                r.state_id,
                r.city_id,
                &r.country_key,
                &r.state_key,
                &r.city_name,
            );
        }
        for r in &geo.ipsv6 {
            let from = ((r.from_hi as u128) << 64) | r.from_lo as u128;
            let to = ((r.to_hi as u128) << 64) | r.to_lo as u128;
            builder.add_range_v6(
                from,
                to,
                r.country_id,
                r.state_id,
                r.city_id,
                &r.country_key,
                &r.state_key,
                &r.city_name,
            );
        }
        builder.build()
    }

    /// Lower the snapshot back into its container message
    pub fn to_geo(&self) -> Geo {
        Geo {
            ipsv4: self
                .v4
                .iter()
                .map(|r| Ipv4Range {
                    from: r.from,
                    to: r.to,
                    country_id: r.el.country_id,
                    state_id: r.el.state_id,
                    city_id: r.el.city_id,
                    country_key: r.el.country_key.to_string(),
                    state_key: r.el.state_key.to_string(),
                    city_name: r.el.city_name.to_string(),
                })
                .collect(),
            ipsv6: self
                .v6
                .iter()
                .map(|r| Ipv6Range {
                    from_hi: (r.from >> 64) as u64,
                    from_lo: r.from as u64,
                    to_hi: (r.to >> 64) as u64,
                    to_lo: r.to as u64,
                    country_id: r.el.country_id,
                    state_id: r.el.state_id,
                    city_id: r.el.city_id,
                    country_key: r.el.country_key.to_string(),
                    state_key: r.el.state_key.to_string(),
                    city_name: r.el.city_name.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Parse a snapshot from container bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot> {
        Ok(Self::from_geo(&Geo::decode(bytes)?))
    }

    /// Serialize to container bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_geo().encode_to_vec()
    }

    /// Memory-map a snapshot file and parse it
    ///
    /// The mapping only lives for the duration of the parse; the returned
    /// snapshot owns its data.
    pub fn load(path: &Path) -> Result<Snapshot> {
        let begin = Instant::now();
        let file = File::open(path).map_err(|e| {
            GeoDbError::SnapshotLoad(format!("can't open {}: {}", path.display(), e))
        })?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            GeoDbError::SnapshotLoad(format!("can't mmap {}: {}", path.display(), e))
        })?;
        if mmap.is_empty() {
            return Err(GeoDbError::SnapshotLoad(format!(
                "{} is empty",
                path.display()
            )));
        }
        let snapshot = Snapshot::from_bytes(&mmap).map_err(|e| {
            GeoDbError::SnapshotLoad(format!("can't parse {}: {}", path.display(), e))
        })?;
        info!(
            "geodb loaded in {:.3} sec ({} v4 / {} v6 ranges)",
            begin.elapsed().as_secs_f64(),
            snapshot.len_v4(),
            snapshot.len_v6()
        );
        Ok(snapshot)
    }
}

/// Mutable construction side of a [`Snapshot`]
///
/// Entries are keyed by the range's `to` address; inserting a second range
/// with the same `to` replaces the first.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    v4: BTreeMap<u32, RangeV4>,
    v6: BTreeMap<u128, RangeV6>,
    pool: HashSet<Arc<str>>,
}

impl SnapshotBuilder {
    /// An empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, s: &str) -> Arc<str> {
        match self.pool.get(s) {
            Some(handle) => Arc::clone(handle),
            None => {
                let handle: Arc<str> = Arc::from(s);
                self.pool.insert(Arc::clone(&handle));
                handle
            }
        }
    }

    fn element(
        &mut self,
        country_id: u32,
        state_id: u32,
        city_id: u32,
        country_key: &str,
        state_key: &str,
        city_name: &str,
    ) -> Element {
        Element {
            country_id,
            state_id,
            city_id,
            country_key: self.intern(country_key),
            state_key: self.intern(state_key),
            city_name: self.intern(city_name),
        }
    }

    /// Add an IPv4 range, interning its labels
    #[allow(clippy::too_many_arguments)]
    pub fn add_range_v4(
        &mut self,
        from: u32,
        to: u32,
        country_id: u32,
        state_id: u32,
        city_id: u32,
        country_key: &str,
        state_key: &str,
        city_name: &str,
    ) {
        let el = self.element(country_id, state_id, city_id, country_key, state_key, city_name);
        self.v4.insert(to, RangeV4 { from, to, el });
    }

    /// Add an IPv6 range, interning its labels
    #[allow(clippy::too_many_arguments)]
    pub fn add_range_v6(
        &mut self,
        from: u128,
        to: u128,
        country_id: u32,
        state_id: u32,
        city_id: u32,
        country_key: &str,
        state_key: &str,
        city_name: &str,
    ) {
        let el = self.element(country_id, state_id, city_id, country_key, state_key, city_name);
        self.v6.insert(to, RangeV6 { from, to, el });
    }

    /// Freeze into the immutable, binary-searchable form
    pub fn build(self) -> Snapshot {
        Snapshot {
            v4: self.v4.into_values().collect(),
            v6: self.v6.into_values().collect(),
        }
    }
}
