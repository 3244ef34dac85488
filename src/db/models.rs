use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::codes::{DeviceType, InstanceType, NetworkType, PlacementState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Network {
    pub id: i64,
    pub project_id: i64,
    /// Owning project name (joined from `projects`).
    pub project: String,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "type", try_from = "i64")]
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    #[sqlx(try_from = "i64")]
    pub state: PlacementState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Image {
    pub id: i64,
    pub project_id: i64,
    pub project: String,
    pub fingerprint: String,
    pub filename: String,
    pub size: i64,
    pub public: bool,
    pub architecture: String,
    #[sqlx(rename = "type", try_from = "i64")]
    #[serde(rename = "type")]
    pub image_type: InstanceType,
    pub creation_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Profile {
    pub id: i64,
    pub project_id: i64,
    pub project: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Instance {
    pub id: i64,
    pub project_id: i64,
    pub project: String,
    pub name: String,
    /// Cluster member hosting the instance, if placed.
    pub node: Option<String>,
    #[sqlx(rename = "type", try_from = "i64")]
    #[serde(rename = "type")]
    pub instance_type: InstanceType,
    pub architecture: String,
    pub ephemeral: bool,
    pub stateful: bool,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub last_use_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct AuthGroup {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Device row owned by a profile or an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
}

/// Association between an instance and a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceProfile {
    pub id: i64,
    pub instance_id: i64,
    pub profile_id: i64,
    pub apply_order: i64,
}

/// Node placement record of a network or an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    pub node_id: i64,
    pub node: String,
    pub state: PlacementState,
}
