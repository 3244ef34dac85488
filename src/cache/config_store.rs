//! Generic loader for `(entity_id, key, value)` side tables.

use ahash::AHashMap;
use metacache_entity::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeMap;
use tracing::debug;

use crate::cache::{id_chunks, push_id_list};
use crate::error::{CacheError, CacheResult};

/// Key/value configuration of one entity. Ordered so that serialized views
/// are byte-stable.
pub type ConfigMap = BTreeMap<String, String>;

#[derive(Debug, FromRow)]
struct ConfigRow {
    entity_id: i64,
    key: Option<String>,
    value: Option<String>,
}

/// Aggregates a config table into `entity_id -> ConfigMap`.
///
/// An entity present in the map with no keys was loaded and has zero rows; an
/// entity absent from the map was never loaded.
#[derive(Debug)]
pub struct ConfigStore {
    kind: EntityKind,
    entity_table: &'static str,
    config_table: &'static str,
    foreign_key: &'static str,
    maps: AHashMap<i64, ConfigMap>,
    all_loaded: bool,
}

impl ConfigStore {
    pub fn new(
        kind: EntityKind,
        entity_table: &'static str,
        config_table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            kind,
            entity_table,
            config_table,
            foreign_key,
            maps: AHashMap::new(),
            all_loaded: false,
        }
    }

    /// Loads config rows for `ids`, or for every entity when `ids` is empty.
    /// Maps of the returned entities are rebuilt from this load's rows.
    pub async fn load(&mut self, conn: &mut SqliteConnection, ids: &[i64]) -> CacheResult<()> {
        if self.all_loaded {
            return Ok(());
        }

        let mut loaded: AHashMap<i64, ConfigMap> = AHashMap::new();
        for chunk in id_chunks(ids) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT e.id AS entity_id, c.key AS key, c.value AS value \
                 FROM {entity} AS e LEFT JOIN {config} AS c ON c.{fk} = e.id",
                entity = self.entity_table,
                config = self.config_table,
                fk = self.foreign_key,
            ));
            if !chunk.is_empty() {
                qb.push(" WHERE ");
                push_id_list(&mut qb, "e.id", chunk);
            }
            qb.push(" ORDER BY e.id, c.id");

            let rows: Vec<ConfigRow> = qb
                .build_query_as()
                .fetch_all(&mut *conn)
                .await
                .map_err(CacheError::store(self.kind, "load config of"))?;

            for row in rows {
                let map = loaded.entry(row.entity_id).or_default();
                if let (Some(key), Some(value)) = (row.key, row.value) {
                    map.insert(key, value);
                }
            }
        }

        debug!(
            kind = %self.kind,
            table = self.config_table,
            requested = ids.len(),
            entities = loaded.len(),
            "config loaded"
        );

        self.maps.extend(loaded);
        if ids.is_empty() {
            self.all_loaded = true;
        }
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<&ConfigMap> {
        self.maps.get(&id)
    }

    /// Ids from `ids` that have no loaded map yet.
    pub fn missing(&self, ids: &[i64]) -> Vec<i64> {
        if self.all_loaded {
            return Vec::new();
        }
        ids.iter()
            .copied()
            .filter(|id| !self.maps.contains_key(id))
            .collect()
    }

    pub fn is_all_loaded(&self) -> bool {
        self.all_loaded
    }
}
