//! Devices of profiles or instances, with their own config tables.

use ahash::AHashMap;
use metacache_entity::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeMap;
use tracing::debug;

use crate::cache::config_store::{ConfigMap, ConfigStore};
use crate::cache::{id_chunks, push_id_list};
use crate::db::{Device, DeviceType};
use crate::error::{CacheError, CacheResult};

/// Devices of one owner, keyed by device name.
pub type DeviceRows = BTreeMap<String, Device>;

#[derive(Debug, FromRow)]
struct DeviceRow {
    owner_id: i64,
    device_id: Option<i64>,
    name: Option<String>,
    device_type: Option<i64>,
}

#[derive(Debug)]
pub struct DeviceStore {
    kind: EntityKind,
    owner_table: &'static str,
    device_table: &'static str,
    owner_fk: &'static str,
    devices: AHashMap<i64, DeviceRows>,
    /// Keyed by device row id, never by owner id.
    config: ConfigStore,
    all_loaded: bool,
}

impl DeviceStore {
    pub fn new(
        kind: EntityKind,
        owner_table: &'static str,
        device_table: &'static str,
        owner_fk: &'static str,
        device_config_table: &'static str,
        device_fk: &'static str,
    ) -> Self {
        Self {
            kind,
            owner_table,
            device_table,
            owner_fk,
            devices: AHashMap::new(),
            config: ConfigStore::new(kind, device_table, device_config_table, device_fk),
            all_loaded: false,
        }
    }

    /// Loads devices of `owner_ids` (every owner when empty), then the config
    /// of the devices found.
    pub async fn load(
        &mut self,
        conn: &mut SqliteConnection,
        owner_ids: &[i64],
    ) -> CacheResult<()> {
        if self.all_loaded {
            return Ok(());
        }

        let mut loaded: AHashMap<i64, DeviceRows> = AHashMap::new();
        let mut device_ids = Vec::new();
        for chunk in id_chunks(owner_ids) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT o.id AS owner_id, d.id AS device_id, d.name AS name, d.type AS device_type \
                 FROM {owner} AS o LEFT JOIN {devices} AS d ON d.{fk} = o.id",
                owner = self.owner_table,
                devices = self.device_table,
                fk = self.owner_fk,
            ));
            if !chunk.is_empty() {
                qb.push(" WHERE ");
                push_id_list(&mut qb, "o.id", chunk);
            }
            qb.push(" ORDER BY o.id, d.id");

            let rows: Vec<DeviceRow> = qb
                .build_query_as()
                .fetch_all(&mut *conn)
                .await
                .map_err(CacheError::store(self.kind, "load devices of"))?;

            for row in rows {
                let owner = loaded.entry(row.owner_id).or_default();
                let Some(device) = self.device_from_row(row)? else {
                    continue;
                };
                device_ids.push(device.id);
                owner.insert(device.name.clone(), device);
            }
        }

        if owner_ids.is_empty() {
            self.config.load(conn, &[]).await?;
        } else if !device_ids.is_empty() {
            self.config.load(conn, &device_ids).await?;
        }

        debug!(
            kind = %self.kind,
            table = self.device_table,
            owners = loaded.len(),
            devices = device_ids.len(),
            "devices loaded"
        );

        self.devices.extend(loaded);
        if owner_ids.is_empty() {
            self.all_loaded = true;
        }
        Ok(())
    }

    fn device_from_row(&self, row: DeviceRow) -> CacheResult<Option<Device>> {
        let DeviceRow {
            owner_id,
            device_id,
            name,
            device_type,
        } = row;

        let Some(id) = device_id else {
            return Ok(None);
        };
        let (Some(name), Some(code)) = (name, device_type) else {
            return Err(CacheError::integrity(format!(
                "{} device {id} has no name or type",
                self.kind
            )));
        };
        let device_type = DeviceType::try_from(code).map_err(|e| CacheError::Store {
            kind: self.kind,
            op: "decode device of",
            source: sqlx::Error::Decode(Box::new(e)),
        })?;

        Ok(Some(Device {
            id,
            owner_id,
            name,
            device_type,
        }))
    }

    /// Devices of `owner_id`; `None` until the owner has been loaded.
    pub fn get(&self, owner_id: i64) -> Option<&DeviceRows> {
        self.devices.get(&owner_id)
    }

    pub fn device_config(&self, device_id: i64) -> Option<&ConfigMap> {
        self.config.get(device_id)
    }

    pub fn missing(&self, owner_ids: &[i64]) -> Vec<i64> {
        if self.all_loaded {
            return Vec::new();
        }
        owner_ids
            .iter()
            .copied()
            .filter(|id| !self.devices.contains_key(id))
            .collect()
    }
}
