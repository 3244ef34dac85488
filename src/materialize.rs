//! Full-view assembly: an entity plus its config, devices and, for
//! instances, the profiles applied to it and the expanded result.
//!
//! Composition only reads the caches. Every dependency must already be
//! loaded; a gap is an integrity fault, never an empty default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::{Caches, ConfigMap, DeviceStore};
use crate::db::{DeviceType, Image, Instance, Network, Placement, Profile};
use crate::error::{CacheError, CacheResult};

/// A device with its own config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFull {
    pub id: i64,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub config: ConfigMap,
}

/// Devices of one owner keyed by name.
pub type Devices = BTreeMap<String, DeviceFull>;

/// Expanded devices: device name to merged config.
pub type ExpandedDevices = BTreeMap<String, ConfigMap>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    pub config: ConfigMap,
    pub devices: ExpandedDevices,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileFull {
    #[serde(flatten)]
    pub profile: Profile,
    pub config: ConfigMap,
    pub devices: Devices,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedProfile {
    pub apply_order: i64,
    #[serde(flatten)]
    pub profile: ProfileFull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceFull {
    #[serde(flatten)]
    pub instance: Instance,
    pub config: ConfigMap,
    /// The instance's local devices; not merged into `expanded`.
    pub devices: Devices,
    /// Applied profiles in apply order.
    pub profiles: Vec<AppliedProfile>,
    pub expanded: Expansion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFull {
    #[serde(flatten)]
    pub network: Network,
    pub config: ConfigMap,
    pub nodes: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFull {
    #[serde(flatten)]
    pub image: Image,
    pub properties: ConfigMap,
    pub nodes: Vec<Placement>,
}

/// One profile's contribution to an expansion.
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub apply_order: i64,
    /// Secondary sort key for equal apply orders (the association row id).
    pub tie: i64,
    pub config: &'a ConfigMap,
    pub devices: &'a Devices,
}

/// Merges `layers` in ascending `(apply_order, tie)` order, then `own_config`.
///
/// Config keys are overwritten by later layers. Devices are merged per key:
/// a later layer only replaces the keys it sets on a device of the same name.
pub fn expand(layers: &[Layer<'_>], own_config: &ConfigMap) -> Expansion {
    let mut ordered: Vec<&Layer<'_>> = layers.iter().collect();
    ordered.sort_by_key(|layer| (layer.apply_order, layer.tie));

    let mut expansion = Expansion::default();
    for layer in ordered {
        expansion
            .config
            .extend(layer.config.iter().map(|(k, v)| (k.clone(), v.clone())));

        for (name, device) in layer.devices {
            expansion.devices.entry(name.clone()).or_default().extend(
                device
                    .config
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
    }

    expansion
        .config
        .extend(own_config.iter().map(|(k, v)| (k.clone(), v.clone())));
    expansion
}

pub fn compose_profile(caches: &Caches, profile: &Profile) -> CacheResult<ProfileFull> {
    let config = caches
        .profile_config
        .get(profile.id)
        .ok_or_else(|| missing("config", "profile", profile.id))?;
    let devices = compose_devices(&caches.profile_devices, "profile", profile.id)?;

    Ok(ProfileFull {
        profile: profile.clone(),
        config: config.clone(),
        devices,
    })
}

pub fn compose_instance(caches: &Caches, instance: &Instance) -> CacheResult<InstanceFull> {
    let associations = caches
        .instance_profiles
        .get(instance.id)
        .ok_or_else(|| missing("profile associations", "instance", instance.id))?;

    let mut profiles = Vec::with_capacity(associations.len());
    let mut ties = Vec::with_capacity(associations.len());
    for association in associations {
        let profile = caches.profiles.get(association.profile_id).ok_or_else(|| {
            CacheError::integrity(format!(
                "profile {} applied to instance {} is not cached",
                association.profile_id, instance.id
            ))
        })?;
        profiles.push(AppliedProfile {
            apply_order: association.apply_order,
            profile: compose_profile(caches, profile)?,
        });
        ties.push(association.id);
    }

    let config = caches
        .instance_config
        .get(instance.id)
        .ok_or_else(|| missing("config", "instance", instance.id))?
        .clone();
    let devices = compose_devices(&caches.instance_devices, "instance", instance.id)?;

    let layers: Vec<Layer<'_>> = profiles
        .iter()
        .zip(&ties)
        .map(|(applied, tie)| Layer {
            apply_order: applied.apply_order,
            tie: *tie,
            config: &applied.profile.config,
            devices: &applied.profile.devices,
        })
        .collect();
    let expanded = expand(&layers, &config);

    Ok(InstanceFull {
        instance: instance.clone(),
        config,
        devices,
        profiles,
        expanded,
    })
}

pub fn compose_network(caches: &Caches, network: &Network) -> CacheResult<NetworkFull> {
    let config = caches
        .network_config
        .get(network.id)
        .ok_or_else(|| missing("config", "network", network.id))?;
    let nodes = caches
        .network_nodes
        .get(network.id)
        .ok_or_else(|| missing("placements", "network", network.id))?;

    Ok(NetworkFull {
        network: network.clone(),
        config: config.clone(),
        nodes: nodes.to_vec(),
    })
}

pub fn compose_image(caches: &Caches, image: &Image) -> CacheResult<ImageFull> {
    let properties = caches
        .image_properties
        .get(image.id)
        .ok_or_else(|| missing("properties", "image", image.id))?;
    let nodes = caches
        .image_nodes
        .get(image.id)
        .ok_or_else(|| missing("placements", "image", image.id))?;

    Ok(ImageFull {
        image: image.clone(),
        properties: properties.clone(),
        nodes: nodes.to_vec(),
    })
}

fn compose_devices(store: &DeviceStore, owner: &str, owner_id: i64) -> CacheResult<Devices> {
    let rows = store
        .get(owner_id)
        .ok_or_else(|| missing("devices", owner, owner_id))?;

    rows.iter()
        .map(|(name, device)| {
            let config = store.device_config(device.id).ok_or_else(|| {
                CacheError::integrity(format!(
                    "config of device {name:?} ({}) of {owner} {owner_id} not loaded",
                    device.id
                ))
            })?;
            Ok((
                name.clone(),
                DeviceFull {
                    id: device.id,
                    device_type: device.device_type,
                    config: config.clone(),
                },
            ))
        })
        .collect()
}

fn missing(what: &str, owner: &str, id: i64) -> CacheError {
    CacheError::integrity(format!("{what} of {owner} {id} not loaded"))
}
