//! Cache-first façade over the metadata store.
//!
//! A `Model` is meant to live for one logical unit of work (one request, one
//! transaction). Every accessor takes `&mut self`, so a model is never shared
//! between concurrent callers and its scope flags need no locking. Scopes are
//! never invalidated: rows written by other cluster members after a scope was
//! loaded are not seen by this model.

use futures::future::BoxFuture;
use metacache_entity::EntityKind;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::authz::AuthzRecord;
use crate::cache::{Caches, Scope, Slot};
use crate::db::{AuthGroup, Image, Instance, Network, Profile, Project, StoreTx, TransactionProvider};
use crate::error::{CacheError, CacheResult};
use crate::expand::{ExpansionStrategy, InstanceExpansion};
use crate::materialize::{
    ImageFull, InstanceFull, NetworkFull, ProfileFull, compose_image, compose_instance,
    compose_network, compose_profile,
};

pub struct Model {
    provider: Arc<dyn TransactionProvider>,
    ambient: Option<StoreTx>,
    cache: Caches,
}

impl Model {
    pub fn new(provider: Arc<dyn TransactionProvider>) -> Self {
        Self {
            provider,
            ambient: None,
            cache: Caches::default(),
        }
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(Arc::new(pool))
    }

    /// Runs every following load on `tx` until it is detached. The caller
    /// stays responsible for committing it.
    pub fn attach(&mut self, tx: StoreTx) {
        self.ambient = Some(tx);
    }

    pub fn detach(&mut self) -> Option<StoreTx> {
        self.ambient.take()
    }

    pub fn has_ambient(&self) -> bool {
        self.ambient.is_some()
    }

    pub fn cache(&self) -> &Caches {
        &self.cache
    }

    /// Runs `op` against the ambient transaction when one is attached,
    /// otherwise inside a fresh transaction that is committed on success.
    pub(crate) async fn with_tx<T, F>(&mut self, op: F) -> CacheResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Caches, &'c mut SqliteConnection) -> BoxFuture<'c, CacheResult<T>>
            + Send,
    {
        let Model {
            provider,
            ambient,
            cache,
        } = self;

        match ambient.as_mut() {
            Some(tx) => op(cache, &mut **tx).await,
            None => {
                let mut tx = provider.begin().await?;
                let out = op(cache, &mut *tx).await?;
                tx.commit().await?;
                Ok(out)
            }
        }
    }

    // ---- Generic scoped access ----

    async fn get_named<E: Slot>(&mut self, project_id: Option<i64>, name: &str) -> CacheResult<E> {
        let what = match project_id {
            Some(project_id) => format!("{name} (project {project_id})"),
            None => name.to_string(),
        };
        let matches = |e: &E| e.scope_project() == project_id && e.scope_name() == name;

        let loader = E::slot(&self.cache);
        let expect_loaded = loader.is_loaded(&Scope::Name { project_id, name });
        if let Some(found) = loader.get_from_cache(&what, matches, expect_loaded)?.first() {
            return Ok((*found).clone());
        }

        debug!(kind = %E::KIND, what = %what, "cache miss, loading by name");
        let names = vec![name.to_string()];
        self.with_tx(move |cache, conn| {
            Box::pin(async move {
                E::slot_mut(cache)
                    .load_by_name(conn, project_id, &names)
                    .await
                    .map(|_| ())
            })
        })
        .await?;

        E::slot(&self.cache)
            .get_from_cache(&what, matches, true)?
            .first()
            .map(|e| (*e).clone())
            .ok_or_else(|| CacheError::not_found(E::KIND, what))
    }

    async fn list_scoped<E: Slot>(&mut self, project_id: Option<i64>) -> CacheResult<Vec<E>> {
        let scope = match project_id {
            Some(project_id) => Scope::Project(project_id),
            None => Scope::All,
        };

        if E::slot(&self.cache).is_loaded(&scope) {
            trace!(kind = %E::KIND, scope = ?scope, "listing from cache");
        } else {
            self.with_tx(move |cache, conn| {
                Box::pin(async move {
                    let loader = E::slot_mut(cache);
                    match project_id {
                        Some(project_id) => loader.load_by_project_id(conn, project_id).await?,
                        None => loader.load_all(conn).await?,
                    };
                    Ok(())
                })
            })
            .await?;
        }

        Ok(E::slot(&self.cache)
            .select(|e| project_id.is_none_or(|p| e.scope_project() == Some(p)))
            .into_iter()
            .cloned()
            .collect())
    }

    async fn project_id(&mut self, project: &str) -> CacheResult<i64> {
        Ok(self.project(project).await?.id)
    }

    // ---- Projects ----

    pub async fn project(&mut self, name: &str) -> CacheResult<Project> {
        self.get_named(None, name).await
    }

    pub async fn projects(&mut self) -> CacheResult<Vec<Project>> {
        self.list_scoped(None).await
    }

    // ---- Networks ----

    pub async fn network(&mut self, project: &str, name: &str) -> CacheResult<Network> {
        let project_id = self.project_id(project).await?;
        self.get_named(Some(project_id), name).await
    }

    pub async fn networks(&mut self, project: &str) -> CacheResult<Vec<Network>> {
        let project_id = self.project_id(project).await?;
        self.list_scoped(Some(project_id)).await
    }

    pub async fn network_full(&mut self, project: &str, name: &str) -> CacheResult<NetworkFull> {
        let network = self.network(project, name).await?;
        self.ensure_network_deps(vec![network.id]).await?;
        compose_network(&self.cache, &network)
    }

    pub async fn networks_full(&mut self, project: &str) -> CacheResult<Vec<NetworkFull>> {
        let networks = self.networks(project).await?;
        self.ensure_network_deps(networks.iter().map(|n| n.id).collect())
            .await?;
        networks
            .iter()
            .map(|network| compose_network(&self.cache, network))
            .collect()
    }

    async fn ensure_network_deps(&mut self, ids: Vec<i64>) -> CacheResult<()> {
        let config = self.cache.network_config.missing(&ids);
        let nodes = self.cache.network_nodes.missing(&ids);
        if config.is_empty() && nodes.is_empty() {
            return Ok(());
        }

        self.with_tx(move |cache, conn| {
            Box::pin(async move {
                if !config.is_empty() {
                    cache.network_config.load(conn, &config).await?;
                }
                if !nodes.is_empty() {
                    cache.network_nodes.load(conn, &nodes).await?;
                }
                Ok(())
            })
        })
        .await
    }

    // ---- Images ----

    pub async fn image(&mut self, project: &str, fingerprint: &str) -> CacheResult<Image> {
        let project_id = self.project_id(project).await?;
        self.get_named(Some(project_id), fingerprint).await
    }

    pub async fn images(&mut self, project: &str) -> CacheResult<Vec<Image>> {
        let project_id = self.project_id(project).await?;
        self.list_scoped(Some(project_id)).await
    }

    pub async fn image_full(&mut self, project: &str, fingerprint: &str) -> CacheResult<ImageFull> {
        let image = self.image(project, fingerprint).await?;
        let ids = vec![image.id];
        let properties = self.cache.image_properties.missing(&ids);
        let nodes = self.cache.image_nodes.missing(&ids);

        if !properties.is_empty() || !nodes.is_empty() {
            self.with_tx(move |cache, conn| {
                Box::pin(async move {
                    if !properties.is_empty() {
                        cache.image_properties.load(conn, &properties).await?;
                    }
                    if !nodes.is_empty() {
                        cache.image_nodes.load(conn, &nodes).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        }

        compose_image(&self.cache, &image)
    }

    // ---- Profiles ----

    pub async fn profile(&mut self, project: &str, name: &str) -> CacheResult<Profile> {
        let project_id = self.project_id(project).await?;
        self.get_named(Some(project_id), name).await
    }

    pub async fn profiles(&mut self, project: &str) -> CacheResult<Vec<Profile>> {
        let project_id = self.project_id(project).await?;
        self.list_scoped(Some(project_id)).await
    }

    pub async fn profile_full(&mut self, project: &str, name: &str) -> CacheResult<ProfileFull> {
        let profile = self.profile(project, name).await?;
        self.ensure_profile_deps(vec![profile.id]).await?;
        compose_profile(&self.cache, &profile)
    }

    pub async fn profiles_full(&mut self, project: &str) -> CacheResult<Vec<ProfileFull>> {
        let profiles = self.profiles(project).await?;
        self.ensure_profile_deps(profiles.iter().map(|p| p.id).collect())
            .await?;
        profiles
            .iter()
            .map(|profile| compose_profile(&self.cache, profile))
            .collect()
    }

    async fn ensure_profile_deps(&mut self, ids: Vec<i64>) -> CacheResult<()> {
        let config = self.cache.profile_config.missing(&ids);
        let devices = self.cache.profile_devices.missing(&ids);
        if config.is_empty() && devices.is_empty() {
            return Ok(());
        }

        self.with_tx(move |cache, conn| {
            Box::pin(async move {
                if !config.is_empty() {
                    cache.profile_config.load(conn, &config).await?;
                }
                if !devices.is_empty() {
                    cache.profile_devices.load(conn, &devices).await?;
                }
                Ok(())
            })
        })
        .await
    }

    // ---- Instances ----

    pub async fn instance(&mut self, project: &str, name: &str) -> CacheResult<Instance> {
        let project_id = self.project_id(project).await?;
        self.get_named(Some(project_id), name).await
    }

    pub async fn instances(&mut self, project: &str) -> CacheResult<Vec<Instance>> {
        let project_id = self.project_id(project).await?;
        self.list_scoped(Some(project_id)).await
    }

    /// Every instance of every project.
    pub async fn all_instances(&mut self) -> CacheResult<Vec<Instance>> {
        self.list_scoped(None).await
    }

    pub async fn instance_full(&mut self, project: &str, name: &str) -> CacheResult<InstanceFull> {
        let instance = self.instance(project, name).await?;
        self.ensure_instance_deps(vec![instance.id]).await?;
        compose_instance(&self.cache, &instance)
    }

    pub async fn instances_full(&mut self, project: &str) -> CacheResult<Vec<InstanceFull>> {
        let instances = self.instances(project).await?;
        self.ensure_instance_deps(instances.iter().map(|i| i.id).collect())
            .await?;
        instances
            .iter()
            .map(|instance| compose_instance(&self.cache, instance))
            .collect()
    }

    /// Loads, in one transaction, everything `compose_instance` reads for
    /// `ids`: associations, own config and devices, then the applied
    /// profiles with their config and devices.
    async fn ensure_instance_deps(&mut self, ids: Vec<i64>) -> CacheResult<()> {
        if self.instance_deps_cached(&ids) {
            trace!(instances = ids.len(), "instance dependencies cached");
            return Ok(());
        }

        self.with_tx(move |cache, conn| {
            Box::pin(async move {
                let associations = cache.instance_profiles.missing(&ids);
                if !associations.is_empty() {
                    cache.instance_profiles.load(conn, &associations).await?;
                }
                let config = cache.instance_config.missing(&ids);
                if !config.is_empty() {
                    cache.instance_config.load(conn, &config).await?;
                }
                let devices = cache.instance_devices.missing(&ids);
                if !devices.is_empty() {
                    cache.instance_devices.load(conn, &devices).await?;
                }

                let profile_ids = cache.instance_profiles.profile_ids(&ids);
                let uncached: Vec<i64> = profile_ids
                    .iter()
                    .copied()
                    .filter(|id| !cache.profiles.contains(*id))
                    .collect();
                if !uncached.is_empty() {
                    cache.profiles.load_by_ids(conn, &uncached).await?;
                }
                let profile_config = cache.profile_config.missing(&profile_ids);
                if !profile_config.is_empty() {
                    cache.profile_config.load(conn, &profile_config).await?;
                }
                let profile_devices = cache.profile_devices.missing(&profile_ids);
                if !profile_devices.is_empty() {
                    cache.profile_devices.load(conn, &profile_devices).await?;
                }
                Ok(())
            })
        })
        .await
    }

    fn instance_deps_cached(&self, ids: &[i64]) -> bool {
        let cache = &self.cache;
        if !cache.instance_profiles.missing(ids).is_empty()
            || !cache.instance_config.missing(ids).is_empty()
            || !cache.instance_devices.missing(ids).is_empty()
        {
            return false;
        }

        let profile_ids = cache.instance_profiles.profile_ids(ids);
        profile_ids.iter().all(|id| cache.profiles.contains(*id))
            && cache.profile_config.missing(&profile_ids).is_empty()
            && cache.profile_devices.missing(&profile_ids).is_empty()
    }

    /// Expanded config/devices of every instance of `project`, computed by
    /// the given strategy.
    pub async fn expand(
        &mut self,
        strategy: ExpansionStrategy,
        project: &str,
    ) -> CacheResult<Vec<InstanceExpansion>> {
        strategy.expander().expand_project(self, project).await
    }

    // ---- Auth groups ----

    pub async fn auth_group(&mut self, name: &str) -> CacheResult<AuthGroup> {
        self.get_named(None, name).await
    }

    pub async fn auth_groups(&mut self) -> CacheResult<Vec<AuthGroup>> {
        self.list_scoped(None).await
    }

    // ---- Authorization view ----

    /// One record per entity of `kind`, keyed by the store's primary keys.
    /// The server is implicit and has no row.
    pub async fn authz_records(&mut self, kind: EntityKind) -> CacheResult<Vec<AuthzRecord>> {
        match kind {
            EntityKind::Server => Ok(Vec::new()),
            EntityKind::Project => self.records::<Project>().await,
            EntityKind::Network => self.records::<Network>().await,
            EntityKind::Image => self.records::<Image>().await,
            EntityKind::Profile => self.records::<Profile>().await,
            EntityKind::Instance => self.records::<Instance>().await,
            EntityKind::AuthGroup => self.records::<AuthGroup>().await,
        }
    }

    async fn records<E: Slot>(&mut self) -> CacheResult<Vec<AuthzRecord>> {
        let rows = self.list_scoped::<E>(None).await?;
        Ok(rows.iter().map(AuthzRecord::from_entity).collect())
    }
}
