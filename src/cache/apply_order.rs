//! Instance to profile associations, in apply order.

use ahash::AHashMap;
use metacache_entity::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::cache::{id_chunks, push_id_list};
use crate::db::InstanceProfile;
use crate::error::{CacheError, CacheResult};

#[derive(Debug, FromRow)]
struct AssociationRow {
    instance_id: i64,
    association_id: Option<i64>,
    profile_id: Option<i64>,
    apply_order: Option<i64>,
}

#[derive(Debug, Default)]
pub struct ApplyOrderStore {
    by_instance: AHashMap<i64, Vec<InstanceProfile>>,
    all_loaded: bool,
}

impl ApplyOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the profile associations of `instance_ids` (every instance when
    /// empty). Each list is sorted by apply order, then by association id.
    pub async fn load(
        &mut self,
        conn: &mut SqliteConnection,
        instance_ids: &[i64],
    ) -> CacheResult<()> {
        if self.all_loaded {
            return Ok(());
        }

        let mut loaded: AHashMap<i64, Vec<InstanceProfile>> = AHashMap::new();
        for chunk in id_chunks(instance_ids) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT i.id AS instance_id, ip.id AS association_id, ip.profile_id AS profile_id, \
                 ip.apply_order AS apply_order \
                 FROM instances AS i LEFT JOIN instances_profiles AS ip ON ip.instance_id = i.id",
            );
            if !chunk.is_empty() {
                qb.push(" WHERE ");
                push_id_list(&mut qb, "i.id", chunk);
            }
            qb.push(" ORDER BY i.id, ip.apply_order, ip.id");

            let rows: Vec<AssociationRow> = qb
                .build_query_as()
                .fetch_all(&mut *conn)
                .await
                .map_err(CacheError::store(EntityKind::Instance, "load profiles of"))?;

            for row in rows {
                let list = loaded.entry(row.instance_id).or_default();
                match (row.association_id, row.profile_id, row.apply_order) {
                    (Some(id), Some(profile_id), Some(apply_order)) => list.push(InstanceProfile {
                        id,
                        instance_id: row.instance_id,
                        profile_id,
                        apply_order,
                    }),
                    (None, None, None) => {}
                    _ => {
                        return Err(CacheError::integrity(format!(
                            "incomplete profile association for instance {}",
                            row.instance_id
                        )));
                    }
                }
            }
        }

        for list in loaded.values_mut() {
            list.sort_by_key(|a| (a.apply_order, a.id));
        }

        debug!(
            requested = instance_ids.len(),
            instances = loaded.len(),
            "instance profiles loaded"
        );

        self.by_instance.extend(loaded);
        if instance_ids.is_empty() {
            self.all_loaded = true;
        }
        Ok(())
    }

    pub fn get(&self, instance_id: i64) -> Option<&[InstanceProfile]> {
        self.by_instance.get(&instance_id).map(Vec::as_slice)
    }

    /// Distinct profile ids referenced by the loaded instances among `instance_ids`.
    pub fn profile_ids(&self, instance_ids: &[i64]) -> Vec<i64> {
        let mut ids: Vec<i64> = instance_ids
            .iter()
            .filter_map(|id| self.by_instance.get(id))
            .flatten()
            .map(|a| a.profile_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn missing(&self, instance_ids: &[i64]) -> Vec<i64> {
        if self.all_loaded {
            return Vec::new();
        }
        instance_ids
            .iter()
            .copied()
            .filter(|id| !self.by_instance.contains_key(id))
            .collect()
    }
}
