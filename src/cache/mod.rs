//! In-memory cache of normalized metadata rows.
//!
//! Layout:
//! - `scoped.rs`: per-kind `ScopedLoader` and its scope flags
//! - `kinds.rs`: SQL and identity of every cached kind
//! - `config_store.rs`: generic key/value side-table loader
//! - `devices.rs`, `apply_order.rs`, `placement.rs`: child loaders

pub mod apply_order;
pub mod config_store;
pub mod devices;
pub mod placement;
pub mod scoped;

mod kinds;

pub use apply_order::ApplyOrderStore;
pub use config_store::{ConfigMap, ConfigStore};
pub use devices::{DeviceRows, DeviceStore};
pub use placement::PlacementStore;
pub use scoped::{Cached, Filter, Scope, ScopedLoader};

use metacache_entity::EntityKind;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::{AuthGroup, Image, Instance, Network, Profile, Project};

/// Upper bound of ids bound into one `IN (...)` list.
const BIND_CHUNK: usize = 500;

/// Every loader of one cache instance.
#[derive(Debug)]
pub struct Caches {
    pub projects: ScopedLoader<Project>,
    pub networks: ScopedLoader<Network>,
    pub images: ScopedLoader<Image>,
    pub profiles: ScopedLoader<Profile>,
    pub instances: ScopedLoader<Instance>,
    pub auth_groups: ScopedLoader<AuthGroup>,

    pub network_config: ConfigStore,
    pub image_properties: ConfigStore,
    pub profile_config: ConfigStore,
    pub instance_config: ConfigStore,

    pub profile_devices: DeviceStore,
    pub instance_devices: DeviceStore,
    pub instance_profiles: ApplyOrderStore,

    pub network_nodes: PlacementStore,
    pub image_nodes: PlacementStore,
}

impl Default for Caches {
    fn default() -> Self {
        Self {
            projects: ScopedLoader::new(),
            networks: ScopedLoader::new(),
            images: ScopedLoader::new(),
            profiles: ScopedLoader::new(),
            instances: ScopedLoader::new(),
            auth_groups: ScopedLoader::new(),

            network_config: ConfigStore::new(
                EntityKind::Network,
                "networks",
                "networks_config",
                "network_id",
            ),
            image_properties: ConfigStore::new(
                EntityKind::Image,
                "images",
                "images_properties",
                "image_id",
            ),
            profile_config: ConfigStore::new(
                EntityKind::Profile,
                "profiles",
                "profiles_config",
                "profile_id",
            ),
            instance_config: ConfigStore::new(
                EntityKind::Instance,
                "instances",
                "instances_config",
                "instance_id",
            ),

            profile_devices: DeviceStore::new(
                EntityKind::Profile,
                "profiles",
                "profiles_devices",
                "profile_id",
                "profiles_devices_config",
                "profile_device_id",
            ),
            instance_devices: DeviceStore::new(
                EntityKind::Instance,
                "instances",
                "instances_devices",
                "instance_id",
                "instances_devices_config",
                "instance_device_id",
            ),
            instance_profiles: ApplyOrderStore::new(),

            network_nodes: PlacementStore::new(
                EntityKind::Network,
                "networks",
                "networks_nodes",
                "network_id",
            ),
            image_nodes: PlacementStore::new(
                EntityKind::Image,
                "images",
                "images_nodes",
                "image_id",
            ),
        }
    }
}

/// Maps a cached kind to its loader inside [`Caches`].
pub trait Slot: Cached {
    fn slot(caches: &Caches) -> &ScopedLoader<Self>;

    fn slot_mut(caches: &mut Caches) -> &mut ScopedLoader<Self>;
}

macro_rules! slot {
    ($ty:ty, $field:ident) => {
        impl Slot for $ty {
            fn slot(caches: &Caches) -> &ScopedLoader<Self> {
                &caches.$field
            }

            fn slot_mut(caches: &mut Caches) -> &mut ScopedLoader<Self> {
                &mut caches.$field
            }
        }
    };
}

slot!(Project, projects);
slot!(Network, networks);
slot!(Image, images);
slot!(Profile, profiles);
slot!(Instance, instances);
slot!(AuthGroup, auth_groups);

/// Splits an id list into bind-sized chunks. An empty list yields one empty
/// chunk, which callers treat as the unscoped query.
pub(crate) fn id_chunks(ids: &[i64]) -> Vec<&[i64]> {
    if ids.is_empty() {
        vec![ids]
    } else {
        ids.chunks(BIND_CHUNK).collect()
    }
}

pub(crate) fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[i64]) {
    qb.push(column).push(" IN (");
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
}
