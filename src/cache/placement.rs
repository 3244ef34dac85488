//! Node placement records (`networks_nodes`, `images_nodes`).

use ahash::AHashMap;
use metacache_entity::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::cache::{id_chunks, push_id_list};
use crate::db::{Placement, PlacementState};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, FromRow)]
struct PlacementRow {
    entity_id: i64,
    node_id: Option<i64>,
    node: Option<String>,
    state: Option<i64>,
}

#[derive(Debug)]
pub struct PlacementStore {
    kind: EntityKind,
    entity_table: &'static str,
    placement_table: &'static str,
    foreign_key: &'static str,
    by_entity: AHashMap<i64, Vec<Placement>>,
    all_loaded: bool,
}

impl PlacementStore {
    pub fn new(
        kind: EntityKind,
        entity_table: &'static str,
        placement_table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            kind,
            entity_table,
            placement_table,
            foreign_key,
            by_entity: AHashMap::new(),
            all_loaded: false,
        }
    }

    pub async fn load(&mut self, conn: &mut SqliteConnection, ids: &[i64]) -> CacheResult<()> {
        if self.all_loaded {
            return Ok(());
        }

        let mut loaded: AHashMap<i64, Vec<Placement>> = AHashMap::new();
        for chunk in id_chunks(ids) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT e.id AS entity_id, p.node_id AS node_id, n.name AS node, p.state AS state \
                 FROM {entity} AS e \
                 LEFT JOIN {placement} AS p ON p.{fk} = e.id \
                 LEFT JOIN nodes AS n ON n.id = p.node_id",
                entity = self.entity_table,
                placement = self.placement_table,
                fk = self.foreign_key,
            ));
            if !chunk.is_empty() {
                qb.push(" WHERE ");
                push_id_list(&mut qb, "e.id", chunk);
            }
            qb.push(" ORDER BY e.id, n.name");

            let rows: Vec<PlacementRow> = qb
                .build_query_as()
                .fetch_all(&mut *conn)
                .await
                .map_err(CacheError::store(self.kind, "load placements of"))?;

            for row in rows {
                let list = loaded.entry(row.entity_id).or_default();
                if let Some(placement) = self.placement_from_row(row)? {
                    list.push(placement);
                }
            }
        }

        debug!(
            kind = %self.kind,
            table = self.placement_table,
            entities = loaded.len(),
            "placements loaded"
        );

        self.by_entity.extend(loaded);
        if ids.is_empty() {
            self.all_loaded = true;
        }
        Ok(())
    }

    /// `None` for an entity without placements. A placement whose node or
    /// state did not come back is an integrity fault.
    fn placement_from_row(&self, row: PlacementRow) -> CacheResult<Option<Placement>> {
        let PlacementRow {
            entity_id,
            node_id,
            node,
            state,
        } = row;

        let (node_id, node, code) = match (node_id, node, state) {
            (None, None, None) => return Ok(None),
            (Some(node_id), Some(node), Some(code)) => (node_id, node, code),
            _ => {
                return Err(CacheError::integrity(format!(
                    "incomplete placement of {} {entity_id}",
                    self.kind
                )));
            }
        };
        let state = PlacementState::try_from(code).map_err(|e| CacheError::Store {
            kind: self.kind,
            op: "decode placement of",
            source: sqlx::Error::Decode(Box::new(e)),
        })?;

        Ok(Some(Placement {
            node_id,
            node,
            state,
        }))
    }

    pub fn get(&self, id: i64) -> Option<&[Placement]> {
        self.by_entity.get(&id).map(Vec::as_slice)
    }

    pub fn missing(&self, ids: &[i64]) -> Vec<i64> {
        if self.all_loaded {
            return Vec::new();
        }
        ids.iter()
            .copied()
            .filter(|id| !self.by_entity.contains_key(id))
            .collect()
    }
}
