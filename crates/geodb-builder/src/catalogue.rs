//! The long-lived country/state/city catalogue
//!
//! Identities live in SQL; a builder run loads all three tables into
//! memory, reconciles them against the MaxMind corpus, and writes back the
//! rows it created or renamed. Once a `key` has an `id`, that `id` never
//! changes.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Context;
use log::info;
use sqlx::mysql::MySqlPool;
use sqlx::Row;

use crate::iso3166;
use geodb_format::CatalogueEntry;

/// One catalogue row, any of the three tables
///
/// `dirty` marks rows created or renamed during this run; only those are
/// written back.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub id: u32,
    /// Country id for states, state id for cities, 0 for countries
    pub parent_id: u32,
    pub key: String,
    pub name: String,
    pub name_en: String,
    pub weight: u32,
    pub dirty: bool,
}

/// In-memory view of the three catalogue tables, keyed by `key`
#[derive(Debug, Default)]
pub struct Catalogue {
    pub countries: BTreeMap<String, Entity>,
    pub states: BTreeMap<String, Entity>,
    pub cities: BTreeMap<String, Entity>,
    next_country_id: u32,
    next_state_id: u32,
    next_city_id: u32,
}

impl Catalogue {
    /// An empty catalogue allocating ids from 1
    pub fn new() -> Self {
        Self {
            next_country_id: 1,
            next_state_id: 1,
            next_city_id: 1,
            ..Default::default()
        }
    }

    /// Seed an entity as if it had been loaded from the database
    #[cfg(test)]
    pub fn seed_state(&mut self, id: u32, country_id: u32, key: &str, name: &str) {
        self.states.insert(
            key.to_string(),
            Entity {
                id,
                parent_id: country_id,
                key: key.to_string(),
                name: name.to_string(),
                name_en: name.to_string(),
                weight: id,
                dirty: false,
            },
        );
        self.next_state_id = self.next_state_id.max(id + 1);
    }

    /// Load all three tables and compute the next free id per table
    pub async fn load(pool: &MySqlPool) -> anyhow::Result<Self> {
        let mut catalogue = Catalogue::new();

        let rows = sqlx::query("select id, `key`, name, name_en, weight from countries")
            .fetch_all(pool)
            .await
            .context("loading countries")?;
        for row in &rows {
            let entity = Entity {
                id: row.get("id"),
                parent_id: 0,
                key: row.get("key"),
                name: row.get("name"),
                name_en: row.get("name_en"),
                weight: row.get("weight"),
                dirty: false,
            };
            catalogue.next_country_id = catalogue.next_country_id.max(entity.id + 1);
            catalogue.countries.insert(entity.key.clone(), entity);
        }
        info!("loaded {} countries from db", catalogue.countries.len());

        let rows = sqlx::query("select id, country_id, `key`, name, name_en, weight from states")
            .fetch_all(pool)
            .await
            .context("loading states")?;
        for row in &rows {
            let entity = Entity {
                id: row.get("id"),
                parent_id: row.get("country_id"),
                key: row.get("key"),
                name: row.get("name"),
                name_en: row.get("name_en"),
                weight: row.get("weight"),
                dirty: false,
            };
            catalogue.next_state_id = catalogue.next_state_id.max(entity.id + 1);
            catalogue.states.insert(entity.key.clone(), entity);
        }
        info!("loaded {} states from db", catalogue.states.len());

        let rows = sqlx::query("select id, state_id, `key`, name, name_en, weight from cities")
            .fetch_all(pool)
            .await
            .context("loading cities")?;
        for row in &rows {
            let entity = Entity {
                id: row.get("id"),
                parent_id: row.get("state_id"),
                key: row.get("key"),
                name: row.get("name"),
                name_en: row.get("name_en"),
                weight: row.get("weight"),
                dirty: false,
            };
            catalogue.next_city_id = catalogue.next_city_id.max(entity.id + 1);
            catalogue.cities.insert(entity.key.clone(), entity);
        }
        info!("loaded {} cities from db", catalogue.cities.len());

        Ok(catalogue)
    }

    /// Create or update a country from a locations row; returns the row
    pub fn touch_country(&mut self, iso: &str, name: &str, en: bool) -> &Entity {
        if !self.countries.contains_key(iso) {
            let id = self.next_country_id;
            self.next_country_id += 1;
            self.countries.insert(
                iso.to_string(),
                Entity {
                    id,
                    parent_id: 0,
                    key: iso.to_string(),
                    name: name.to_string(),
                    name_en: if en { name.to_string() } else { String::new() },
                    weight: id,
                    dirty: true,
                },
            );
        } else if !name.is_empty() {
            let entity = self.countries.get_mut(iso).unwrap();
            if entity.name != name {
                entity.name = name.to_string();
                entity.dirty = true;
            }
            if en && entity.name_en != name {
                entity.name_en = name.to_string();
                entity.dirty = true;
            }
        }
        &self.countries[iso]
    }

    /// Create or update a state; an empty subdivision name falls back to
    /// the subdivision code
    pub fn touch_state(
        &mut self,
        key: &str,
        country_id: u32,
        name: &str,
        iso_code: &str,
        en: bool,
    ) -> &Entity {
        if !self.states.contains_key(key) {
            let id = self.next_state_id;
            self.next_state_id += 1;
            let chosen = if name.is_empty() { iso_code } else { name };
            self.states.insert(
                key.to_string(),
                Entity {
                    id,
                    parent_id: country_id,
                    key: key.to_string(),
                    name: chosen.to_string(),
                    name_en: if en { chosen.to_string() } else { String::new() },
                    weight: id,
                    dirty: true,
                },
            );
        } else if !name.is_empty() {
            let entity = self.states.get_mut(key).unwrap();
            if entity.name != name {
                entity.name = name.to_string();
                entity.dirty = true;
            }
            if en && entity.name_en != name {
                entity.name_en = name.to_string();
                entity.dirty = true;
            }
        }
        &self.states[key]
    }

    /// Create or update a city
    pub fn touch_city(&mut self, key: &str, state_id: u32, name: &str, en: bool) -> &Entity {
        if !self.cities.contains_key(key) {
            let id = self.next_city_id;
            self.next_city_id += 1;
            self.cities.insert(
                key.to_string(),
                Entity {
                    id,
                    parent_id: state_id,
                    key: key.to_string(),
                    name: name.to_string(),
                    name_en: if en { name.to_string() } else { String::new() },
                    weight: id,
                    dirty: true,
                },
            );
        } else if !name.is_empty() {
            let entity = self.cities.get_mut(key).unwrap();
            if entity.name != name {
                entity.name = name.to_string();
                entity.dirty = true;
            }
            if en && entity.name_en != name {
                entity.name_en = name.to_string();
                entity.dirty = true;
            }
        }
        &self.cities[key]
    }

    /// Write back every dirty row, replace-on-primary-key
    pub async fn save(&self, pool: &MySqlPool) -> anyhow::Result<()> {
        let begin = Instant::now();
        let mut created = 0;
        for country in self.countries.values().filter(|c| c.dirty) {
            sqlx::query(
                "replace into countries(id, `key`, name, name_en, weight) values(?, ?, ?, ?, ?)",
            )
            .bind(country.id)
            .bind(&country.key)
            .bind(&country.name)
            .bind(&country.name_en)
            .bind(country.weight)
            .execute(pool)
            .await
            .context("saving countries")?;
            created += 1;
        }
        info!(
            "saved {} countries in {:.3} sec",
            created,
            begin.elapsed().as_secs_f64()
        );

        let begin = Instant::now();
        let mut created = 0;
        for state in self.states.values().filter(|s| s.dirty) {
            sqlx::query(
                "replace into states(id, country_id, `key`, name, name_en, weight) \
                 values(?, ?, ?, ?, ?, ?)",
            )
            .bind(state.id)
            .bind(state.parent_id)
            .bind(&state.key)
            .bind(&state.name)
            .bind(&state.name_en)
            .bind(state.weight)
            .execute(pool)
            .await
            .context("saving states")?;
            created += 1;
        }
        info!(
            "saved {} states in {:.3} sec",
            created,
            begin.elapsed().as_secs_f64()
        );

        let begin = Instant::now();
        let mut created = 0;
        for city in self.cities.values().filter(|c| c.dirty) {
            sqlx::query(
                "replace into cities(id, state_id, `key`, name, name_en, weight) \
                 values(?, ?, ?, ?, ?, ?)",
            )
            .bind(city.id)
            .bind(city.parent_id)
            .bind(&city.key)
            .bind(&city.name)
            .bind(&city.name_en)
            .bind(city.weight)
            .execute(pool)
            .await
            .context("saving cities")?;
            created += 1;
        }
        info!(
            "saved {} cities in {:.3} sec",
            created,
            begin.elapsed().as_secs_f64()
        );

        Ok(())
    }

    /// Lower into the reserved snapshot sections; country keys go out as
    /// three-letter codes like the range records
    pub fn to_entries(
        &self,
    ) -> (
        Vec<CatalogueEntry>,
        Vec<CatalogueEntry>,
        Vec<CatalogueEntry>,
    ) {
        let countries = self
            .countries
            .values()
            .map(|c| CatalogueEntry {
                id: c.id,
                parent_id: 0,
                key: iso3166::iso2_to_iso3(&c.key).unwrap_or(&c.key).to_string(),
                name: c.name.clone(),
                name_en: c.name_en.clone(),
                weight: c.weight,
            })
            .collect();
        let lower = |entities: &BTreeMap<String, Entity>| {
            entities
                .values()
                .map(|e| CatalogueEntry {
                    id: e.id,
                    parent_id: e.parent_id,
                    key: e.key.clone(),
                    name: e.name.clone(),
                    name_en: e.name_en.clone(),
                    weight: e.weight,
                })
                .collect()
        };
        (countries, lower(&self.states), lower(&self.cities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entities_get_monotonic_ids_and_dirty() {
        let mut catalogue = Catalogue::new();
        let us = catalogue.touch_country("US", "United States", true);
        assert_eq!((us.id, us.weight), (1, 1));
        assert!(us.dirty);
        assert_eq!(us.name_en, "United States");

        let de = catalogue.touch_country("DE", "Germany", true);
        assert_eq!(de.id, 2);

        let ca = catalogue.touch_state("US.CA", 1, "California", "CA", true);
        assert_eq!(ca.id, 1);
        assert_eq!(ca.parent_id, 1);

        let sj = catalogue.touch_city("US.CA.5392171", 1, "San Jose", true);
        assert_eq!(sj.id, 1);
        assert_eq!(sj.parent_id, 1);
    }

    #[test]
    fn non_english_pass_leaves_name_en_alone() {
        let mut catalogue = Catalogue::new();
        catalogue.touch_country("US", "United States", true);
        let us = catalogue.touch_country("US", "США", false);
        assert_eq!(us.name, "США");
        assert_eq!(us.name_en, "United States");
    }

    #[test]
    fn unchanged_name_does_not_mark_dirty() {
        let mut catalogue = Catalogue::new();
        catalogue.seed_state(7, 1, "US.CA", "California");
        let ca = catalogue.touch_state("US.CA", 1, "California", "CA", true);
        assert_eq!(ca.id, 7);
        assert!(!ca.dirty);

        let ca = catalogue.touch_state("US.CA", 1, "Golden State", "CA", true);
        assert!(ca.dirty);
        assert_eq!(ca.name, "Golden State");
    }

    #[test]
    fn state_name_falls_back_to_iso_code() {
        let mut catalogue = Catalogue::new();
        let state = catalogue.touch_state("DE.BY", 1, "", "BY", true);
        assert_eq!(state.name, "BY");
        assert_eq!(state.name_en, "BY");
    }

    #[test]
    fn seeded_ids_push_the_allocator_forward() {
        let mut catalogue = Catalogue::new();
        catalogue.seed_state(703883, 4, "UA.43", "Crimea");
        let state = catalogue.touch_state("FR.IDF", 2, "Île-de-France", "IDF", true);
        assert_eq!(state.id, 703884);
    }

    #[test]
    fn catalogue_entries_use_iso3_country_keys() {
        let mut catalogue = Catalogue::new();
        catalogue.touch_country("US", "United States", true);
        catalogue.touch_state("US.CA", 1, "California", "CA", true);
        let (countries, states, _) = catalogue.to_entries();
        assert_eq!(countries[0].key, "USA");
        assert_eq!(states[0].key, "US.CA");
    }

    /// Needs a real MySQL; run with GEODB_TEST_DSN set
    #[tokio::test]
    #[ignore]
    async fn round_trip_through_mysql() {
        let dsn = std::env::var("GEODB_TEST_DSN").expect("GEODB_TEST_DSN not set");
        let pool = MySqlPool::connect(&dsn).await.unwrap();
        let mut catalogue = Catalogue::load(&pool).await.unwrap();
        catalogue.touch_country("US", "United States", true);
        catalogue.save(&pool).await.unwrap();
        let reloaded = Catalogue::load(&pool).await.unwrap();
        assert!(reloaded.countries.contains_key("US"));
    }
}
