//! MaxMind GeoLite2 CSV ingestion
//!
//! Two file kinds: city locations (one row per geoname, localized) and
//! network blocks (one row per CIDR). Headers are validated against the
//! exact published schemas; a mismatch means the download is not the
//! format this builder understands, and nothing sensible can be salvaged.
//! Individual bad rows are warned about and skipped.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};
use log::warn;

use crate::catalogue::Catalogue;
use crate::iso3166;
use geodb::{net4_to_range, net6_to_range, SnapshotBuilder};

/// Locations CSV header, all 14 fields in order
const LOCATIONS_FIELDS: [&str; 14] = [
    "geoname_id",
    "locale_code",
    "continent_code",
    "continent_name",
    "country_iso_code",
    "country_name",
    "subdivision_1_iso_code",
    "subdivision_1_name",
    "subdivision_2_iso_code",
    "subdivision_2_name",
    "city_name",
    "metro_code",
    "time_zone",
    "is_in_european_union",
];

/// Blocks CSV header, all 10 fields in order
const BLOCKS_FIELDS: [&str; 10] = [
    "network",
    "geoname_id",
    "registered_country_geoname_id",
    "represented_country_geoname_id",
    "is_anonymous_proxy",
    "is_satellite_provider",
    "postal_code",
    "latitude",
    "longitude",
    "accuracy_radius",
];

/// Crimea subdivision in the catalogue; rows under it are attributed to
/// country 2017370
const CRIMEA_STATE_ID: u32 = 703883;
const CRIMEA_COUNTRY_ID: u32 = 2017370;

/// A geoname row reduced to what range emission needs
#[derive(Debug, Clone, Default)]
pub struct Location {
    pub country_id: u32,
    pub state_id: u32,
    pub city_id: u32,
    /// Two-letter code; translated to ISO3 at emission
    pub country_key: String,
    /// Bare subdivision code, not the catalogue key
    pub state_key: String,
    /// English city name
    pub city_name: String,
}

/// Map from geoname_id to its reduced location
pub type LocationMap = HashMap<u32, Location>;

fn verify_header(
    headers: &csv::StringRecord,
    expected: &[&str],
    path: &Path,
) -> anyhow::Result<()> {
    if headers.len() != expected.len() {
        bail!(
            "bad file format {}: {} header fields, {} expected",
            path.display(),
            headers.len(),
            expected.len()
        );
    }
    for (i, want) in expected.iter().enumerate() {
        if &headers[i] != *want {
            bail!(
                "field #{} must be {} ({} got) in file {}",
                i,
                want,
                &headers[i],
                path.display()
            );
        }
    }
    Ok(())
}

/// Ingest a locations file, reconciling every row against the catalogue
///
/// `en` marks the English file: only it updates `name_en` (and the
/// locations' city names). Rows without a country code are skipped.
pub fn load_locations(
    path: &Path,
    en: bool,
    catalogue: &mut Catalogue,
    locations: &mut LocationMap,
) -> anyhow::Result<()> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("can't open {}", path.display()))?;
    verify_header(
        reader
            .headers()
            .with_context(|| format!("no csv header in {}", path.display()))?,
        &LOCATIONS_FIELDS,
        path,
    )?;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("bad row in line {} in file {}: {}", line + 2, path.display(), e);
                continue;
            }
        };
        let country_iso = &record[4];
        if country_iso.is_empty() {
            continue;
        }
        let geoname_id: u32 = record[0].parse().unwrap_or(0);
        let mut location = Location {
            country_key: country_iso.to_string(),
            ..Default::default()
        };

        let country = catalogue.touch_country(country_iso, &record[5], en);
        location.country_id = country.id;

        let subdivision = &record[6];
        if !subdivision.is_empty() {
            let state_key = format!("{}.{}", country_iso, subdivision);
            let state =
                catalogue.touch_state(&state_key, location.country_id, &record[7], subdivision, en);
            location.state_id = state.id;
            location.state_key = subdivision.to_string();

            let city_name = &record[10];
            if !city_name.is_empty() {
                let city_key = format!("{}.{}", state_key, &record[0]);
                let city = catalogue.touch_city(&city_key, location.state_id, city_name, en);
                location.city_id = city.id;
                // The snapshot carries the English name whichever locale
                // this pass is loading
                location.city_name = city.name_en.clone();
            }
        }

        if location.state_id == CRIMEA_STATE_ID {
            location.country_id = CRIMEA_COUNTRY_ID;
        }
        locations.insert(geoname_id, location);
    }
    Ok(())
}

/// Resolve a blocks row to a location, falling back to the registered
/// country's geoname
fn resolve<'a>(
    locations: &'a LocationMap,
    geoname_id: &str,
    registered_id: &str,
) -> Option<&'a Location> {
    let id: u32 = geoname_id.parse().unwrap_or(0);
    if let Some(location) = locations.get(&id) {
        return Some(location);
    }
    if registered_id.is_empty() {
        return None;
    }
    let id: u32 = registered_id.parse().unwrap_or(0);
    locations.get(&id)
}

/// ISO3 country key for a location; an untranslatable code keeps its
/// two-letter form
fn country_key(location: &Location) -> &str {
    match iso3166::iso2_to_iso3(&location.country_key) {
        Some(iso3) => iso3,
        None => {
            warn!("no ISO3 code for country {}", location.country_key);
            &location.country_key
        }
    }
}

/// Ingest an IPv4 blocks file, emitting one range per resolvable row
pub fn load_ipv4_blocks(
    path: &Path,
    locations: &LocationMap,
    builder: &mut SnapshotBuilder,
) -> anyhow::Result<()> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("can't open {}", path.display()))?;
    verify_header(
        reader
            .headers()
            .with_context(|| format!("no csv header in {}", path.display()))?,
        &BLOCKS_FIELDS,
        path,
    )?;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("bad row in line {} in file {}: {}", line + 2, path.display(), e);
                continue;
            }
        };
        let network = &record[0];
        if !network.contains('/') {
            warn!("bad network in line {} in file {}", line + 2, path.display());
            continue;
        }
        let (from, to) = net4_to_range(network);
        let Some(location) = resolve(locations, &record[1], &record[2]) else {
            continue;
        };
        builder.add_range_v4(
            from,
            to,
            location.country_id,
            location.state_id,
            location.city_id,
            country_key(location),
            &location.state_key,
            &location.city_name,
        );
    }
    Ok(())
}

/// Ingest an IPv6 blocks file, emitting one range per resolvable row
pub fn load_ipv6_blocks(
    path: &Path,
    locations: &LocationMap,
    builder: &mut SnapshotBuilder,
) -> anyhow::Result<()> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("can't open {}", path.display()))?;
    verify_header(
        reader
            .headers()
            .with_context(|| format!("no csv header in {}", path.display()))?,
        &BLOCKS_FIELDS,
        path,
    )?;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("bad row in line {} in file {}: {}", line + 2, path.display(), e);
                continue;
            }
        };
        let network = &record[0];
        if !network.contains('/') {
            warn!("bad network in line {} in file {}", line + 2, path.display());
            continue;
        }
        let (from, to) = net6_to_range(network);
        let Some(location) = resolve(locations, &record[1], &record[2]) else {
            continue;
        };
        builder.add_range_v6(
            from,
            to,
            location.country_id,
            location.state_id,
            location.city_id,
            country_key(location),
            &location.state_key,
            &location.city_name,
        );
    }
    Ok(())
}
