//! Two interchangeable ways of computing expanded config/devices for every
//! instance of a project:
//! - `ManualExpander` composes full views from the caches row by row;
//! - `AggregateExpander` asks SQLite for the merged result in one statement.
//!
//! Both return instances ordered by id and must agree on every expansion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use tracing::debug;

use crate::cache::ConfigMap;
use crate::error::{CacheError, CacheResult};
use crate::materialize::{ExpandedDevices, Expansion};
use crate::model::Model;
use metacache_entity::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceExpansion {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub expansion: Expansion,
}

#[async_trait]
pub trait Expander: Send + Sync {
    fn name(&self) -> &'static str;

    async fn expand_project(
        &self,
        model: &mut Model,
        project: &str,
    ) -> CacheResult<Vec<InstanceExpansion>>;
}

/// Selects an [`Expander`] from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    #[default]
    Manual,
    Aggregate,
}

impl ExpansionStrategy {
    pub fn expander(self) -> Box<dyn Expander> {
        match self {
            ExpansionStrategy::Manual => Box::new(ManualExpander),
            ExpansionStrategy::Aggregate => Box::new(AggregateExpander),
        }
    }
}

impl fmt::Display for ExpansionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expander().name())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualExpander;

#[async_trait]
impl Expander for ManualExpander {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn expand_project(
        &self,
        model: &mut Model,
        project: &str,
    ) -> CacheResult<Vec<InstanceExpansion>> {
        let instances = model.instances_full(project).await?;
        Ok(instances
            .into_iter()
            .map(|full| InstanceExpansion {
                id: full.instance.id,
                name: full.instance.name,
                expansion: full.expanded,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateExpander;

#[derive(Debug, FromRow)]
struct AggregateRow {
    id: i64,
    name: String,
    expanded_config: String,
    expanded_devices: String,
}

// Precedence inside every partition: instance config (layer 1) over profiles
// (layer 0), then higher apply order, then higher association id.
const AGGREGATE_EXPANSION: &str = r#"
WITH
scoped AS (
    SELECT id, name FROM instances WHERE project_id = ?
),
config_sources AS (
    SELECT ip.instance_id AS instance_id, 0 AS layer, ip.apply_order AS ord, ip.id AS tie,
           pc.key AS key, pc.value AS value
    FROM instances_profiles AS ip
    JOIN scoped AS s ON s.id = ip.instance_id
    JOIN profiles_config AS pc ON pc.profile_id = ip.profile_id
    UNION ALL
    SELECT ic.instance_id, 1, 0, 0, ic.key, ic.value
    FROM instances_config AS ic
    JOIN scoped AS s ON s.id = ic.instance_id
),
config_ranked AS (
    SELECT instance_id, key, value,
           ROW_NUMBER() OVER (
               PARTITION BY instance_id, key
               ORDER BY layer DESC, ord DESC, tie DESC
           ) AS rn
    FROM config_sources
),
device_sources AS (
    SELECT ip.instance_id AS instance_id, ip.apply_order AS ord, ip.id AS tie,
           pd.name AS device, dc.key AS key, dc.value AS value
    FROM instances_profiles AS ip
    JOIN scoped AS s ON s.id = ip.instance_id
    JOIN profiles_devices AS pd ON pd.profile_id = ip.profile_id
    LEFT JOIN profiles_devices_config AS dc ON dc.profile_device_id = pd.id
),
device_ranked AS (
    SELECT instance_id, device, key, value,
           ROW_NUMBER() OVER (
               PARTITION BY instance_id, device, key
               ORDER BY ord DESC, tie DESC
           ) AS rn
    FROM device_sources
),
device_merged AS (
    SELECT instance_id, device,
           COALESCE(json_group_object(key, value) FILTER (WHERE key IS NOT NULL), '{}') AS config
    FROM device_ranked
    WHERE rn = 1
    GROUP BY instance_id, device
)
SELECT
    s.id AS id,
    s.name AS name,
    COALESCE(
        (SELECT json_group_object(c.key, c.value)
         FROM config_ranked AS c
         WHERE c.instance_id = s.id AND c.rn = 1),
        '{}'
    ) AS expanded_config,
    COALESCE(
        (SELECT json_group_object(d.device, json(d.config))
         FROM device_merged AS d
         WHERE d.instance_id = s.id),
        '{}'
    ) AS expanded_devices
FROM scoped AS s
ORDER BY s.id
"#;

#[async_trait]
impl Expander for AggregateExpander {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn expand_project(
        &self,
        model: &mut Model,
        project: &str,
    ) -> CacheResult<Vec<InstanceExpansion>> {
        let project_id = model.project(project).await?.id;

        let rows: Vec<AggregateRow> = model
            .with_tx(move |_, conn| {
                Box::pin(async move {
                    sqlx::query_as::<_, AggregateRow>(AGGREGATE_EXPANSION)
                        .bind(project_id)
                        .fetch_all(&mut *conn)
                        .await
                        .map_err(CacheError::store(EntityKind::Instance, "expand"))
                })
            })
            .await?;

        debug!(project, instances = rows.len(), "aggregate expansion fetched");

        rows.into_iter()
            .map(|row| -> CacheResult<InstanceExpansion> {
                Ok(InstanceExpansion {
                    id: row.id,
                    name: row.name,
                    expansion: Expansion {
                        config: serde_json::from_str::<ConfigMap>(&row.expanded_config)?,
                        devices: serde_json::from_str::<ExpandedDevices>(&row.expanded_devices)?,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_match_config_spelling() {
        for strategy in [ExpansionStrategy::Manual, ExpansionStrategy::Aggregate] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{strategy}\""));
        }
    }

    #[test]
    fn manual_is_the_default() {
        assert_eq!(ExpansionStrategy::default(), ExpansionStrategy::Manual);
    }
}
