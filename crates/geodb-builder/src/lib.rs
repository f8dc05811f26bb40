//! Geodb Builder - Offline Snapshot Construction
//!
//! A batch job that turns the MaxMind GeoLite2 city corpus plus the
//! SQL-backed country/state/city catalogue into a lookup snapshot:
//!
//! ```text
//! catalogue (MySQL) ──┐
//! locations CSVs ─────┼─ reconcile ─▶ geoname → Location
//! blocks CSVs ────────┴─ emit ──────▶ snapshot file (+ dirty rows back to SQL)
//! ```
//!
//! Identities are stable: a key that already has an id keeps it forever,
//! new keys get ids above the table's current maximum, and only created
//! or renamed rows are written back.

pub mod catalogue;
pub mod config;
pub mod iso3166;
pub mod maxmind;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use log::info;
use sqlx::mysql::MySqlPool;

use crate::catalogue::Catalogue;
use crate::config::BuilderConfig;
use crate::maxmind::LocationMap;
use geodb::{Snapshot, SnapshotBuilder};

/// Serialize a snapshot and publish it with a temp-file-plus-rename
///
/// The rename keeps the lookup service's watcher from ever seeing a
/// half-written file.
pub fn save_snapshot(
    path: &Path,
    snapshot: &Snapshot,
    catalogue: Option<&Catalogue>,
) -> anyhow::Result<()> {
    let mut geo = snapshot.to_geo();
    if let Some(catalogue) = catalogue {
        (geo.countries, geo.states, geo.cities) = catalogue.to_entries();
    }
    let bytes = geo.encode_to_vec();

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes).with_context(|| format!("can't write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("can't rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Run the whole pipeline
pub async fn run(config: &BuilderConfig) -> anyhow::Result<()> {
    let pool = MySqlPool::connect(&config.db.url())
        .await
        .with_context(|| format!("can't connect to {}:{}", config.db.host, config.db.port))?;

    let begin = Instant::now();
    let mut catalogue = Catalogue::load(&pool).await?;
    info!("loaded from db in {:.3} sec", begin.elapsed().as_secs_f64());

    let mut locations = LocationMap::new();
    let begin = Instant::now();
    maxmind::load_locations(
        &config.maxmind.locations_en_path(),
        true,
        &mut catalogue,
        &mut locations,
    )?;
    info!("en locations loaded in {:.3} sec", begin.elapsed().as_secs_f64());

    let begin = Instant::now();
    maxmind::load_locations(
        &config.maxmind.locations_ru_path(),
        false,
        &mut catalogue,
        &mut locations,
    )?;
    info!("ru locations loaded in {:.3} sec", begin.elapsed().as_secs_f64());

    let mut builder = SnapshotBuilder::new();
    let begin = Instant::now();
    maxmind::load_ipv4_blocks(&config.maxmind.ipv4_path(), &locations, &mut builder)?;
    info!("ipv4 loaded in {:.3} sec", begin.elapsed().as_secs_f64());

    let begin = Instant::now();
    maxmind::load_ipv6_blocks(&config.maxmind.ipv6_path(), &locations, &mut builder)?;
    info!("ipv6 loaded in {:.3} sec", begin.elapsed().as_secs_f64());

    let begin = Instant::now();
    let snapshot = builder.build();
    save_snapshot(
        &config.db.geodb_file,
        &snapshot,
        config.db.emit_catalogue.then_some(&catalogue),
    )?;
    info!(
        "geodb saved in {:.3} sec ({} v4 / {} v6 ranges)",
        begin.elapsed().as_secs_f64(),
        snapshot.len_v4(),
        snapshot.len_v6()
    );

    let begin = Instant::now();
    catalogue.save(&pool).await?;
    info!("saved to db in {:.3} sec", begin.elapsed().as_secs_f64());

    Ok(())
}
