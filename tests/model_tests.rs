mod common;

use common::TestDb;
use metacache::cache::ConfigMap;
use metacache::db::{DeviceType, PlacementState, TransactionProvider};
use metacache::{EntityKind, ExpansionStrategy, Model};

fn config(pairs: &[(&str, &str)]) -> ConfigMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_instance_full_applies_profiles_in_order() {
    let db = TestDb::new("apply_order").await;
    let p1 = db.project("p1").await;
    let base = db.profile(p1, "base").await;
    let overlay = db.profile(p1, "overlay").await;
    db.profile_config(base, "a", "1").await;
    db.profile_config(base, "b", "2").await;
    db.profile_config(overlay, "b", "3").await;
    db.profile_config(overlay, "c", "4").await;

    let c1 = db.instance(p1, "c1").await;
    db.instance_config(c1, "c", "5").await;
    db.instance_config(c1, "d", "6").await;
    // Inserted out of order on purpose
    db.apply_profile(c1, overlay, 2).await;
    db.apply_profile(c1, base, 1).await;

    let mut model = Model::from_pool(db.pool.clone());

    // 1. Expanded config follows apply order, then the instance's own keys
    let full = model.instance_full("p1", "c1").await.unwrap();
    assert_eq!(
        full.expanded.config,
        config(&[("a", "1"), ("b", "3"), ("c", "5"), ("d", "6")])
    );
    assert_eq!(full.config, config(&[("c", "5"), ("d", "6")]));

    // 2. Applied profiles are listed in apply order
    let names: Vec<&str> = full
        .profiles
        .iter()
        .map(|p| p.profile.profile.name.as_str())
        .collect();
    assert_eq!(names, ["base", "overlay"]);
    assert_eq!(full.profiles[0].apply_order, 1);

    // 3. Both strategies agree
    let manual = model.expand(ExpansionStrategy::Manual, "p1").await.unwrap();
    let aggregate = model
        .expand(ExpansionStrategy::Aggregate, "p1")
        .await
        .unwrap();
    assert_eq!(manual, aggregate);
    assert_eq!(manual[0].expansion, full.expanded);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_devices_merge_by_key_across_profiles() {
    let db = TestDb::new("device_merge").await;
    let p1 = db.project("p1").await;
    let lan = db.profile(p1, "lan").await;
    let tuned = db.profile(p1, "tuned").await;

    let eth0 = db.profile_device(lan, "eth0", DeviceType::Nic).await;
    db.profile_device_config(eth0, "nictype", "bridged").await;
    db.profile_device_config(eth0, "parent", "br0").await;
    let eth0_tuned = db.profile_device(tuned, "eth0", DeviceType::Nic).await;
    db.profile_device_config(eth0_tuned, "parent", "br1").await;
    db.profile_device_config(eth0_tuned, "mtu", "1500").await;
    db.profile_device(tuned, "gpu0", DeviceType::Gpu).await;

    let c1 = db.instance(p1, "c1").await;
    let root = db.instance_device(c1, "root", DeviceType::Disk).await;
    db.instance_device_config(root, "path", "/").await;
    db.apply_profile(c1, lan, 0).await;
    db.apply_profile(c1, tuned, 1).await;

    let mut model = Model::from_pool(db.pool.clone());
    let full = model.instance_full("p1", "c1").await.unwrap();

    // 1. Same-named devices merge key by key, later profile wins per key
    assert_eq!(
        full.expanded.devices["eth0"],
        config(&[("nictype", "bridged"), ("parent", "br1"), ("mtu", "1500")])
    );
    // 2. A device with no config still shows up
    assert_eq!(full.expanded.devices["gpu0"], ConfigMap::new());
    // 3. Local devices stay out of the expansion
    assert!(!full.expanded.devices.contains_key("root"));
    assert_eq!(full.devices["root"].device_type, DeviceType::Disk);
    assert_eq!(full.devices["root"].config, config(&[("path", "/")]));

    let aggregate = model
        .expand(ExpansionStrategy::Aggregate, "p1")
        .await
        .unwrap();
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate[0].expansion, full.expanded);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_equal_apply_orders_break_ties_by_association() {
    let db = TestDb::new("ties").await;
    let p1 = db.project("p1").await;
    let first = db.profile(p1, "first").await;
    let second = db.profile(p1, "second").await;
    db.profile_config(first, "k", "first").await;
    db.profile_config(second, "k", "second").await;

    let c1 = db.instance(p1, "c1").await;
    db.apply_profile(c1, first, 0).await;
    db.apply_profile(c1, second, 0).await;

    let mut model = Model::from_pool(db.pool.clone());
    let manual = model.expand(ExpansionStrategy::Manual, "p1").await.unwrap();
    let aggregate = model
        .expand(ExpansionStrategy::Aggregate, "p1")
        .await
        .unwrap();

    assert_eq!(manual[0].expansion.config["k"], "second");
    assert_eq!(manual, aggregate);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_missing_names_are_not_found() {
    let db = TestDb::new("not_found").await;
    let p1 = db.project("p1").await;
    db.profile(p1, "default").await;

    let mut model = Model::from_pool(db.pool.clone());

    // 1. Unknown profile in a known project
    let err = model.profile("p1", "ghost").await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(err.to_string().starts_with("profile not found"));

    // 2. Asking again is answered from the name scope
    let err = model.profile("p1", "ghost").await.unwrap_err();
    assert!(err.is_not_found());

    // 3. Unknown project
    let err = model.instances("nope").await.unwrap_err();
    assert!(err.is_not_found());

    // 4. A loaded-empty project lists nothing rather than failing
    db.project("empty").await;
    assert!(model.instances("empty").await.unwrap().is_empty());

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_listing_fills_the_cache_for_lookups() {
    let db = TestDb::new("listing").await;
    let p1 = db.project("p1").await;
    let p2 = db.project("p2").await;
    db.instance(p1, "c1").await;
    db.instance(p1, "c2").await;
    db.instance(p2, "c1").await;

    let mut model = Model::from_pool(db.pool.clone());

    let in_p1 = model.instances("p1").await.unwrap();
    assert_eq!(in_p1.len(), 2);
    assert!(in_p1.iter().all(|i| i.project == "p1"));

    let every = model.all_instances().await.unwrap();
    assert_eq!(every.len(), 3);

    // Same name, different projects
    let c1_p2 = model.instance("p2", "c1").await.unwrap();
    assert_eq!(c1_p2.project_id, p2);
    assert_eq!(model.projects().await.unwrap().len(), 2);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_ambient_transaction_sees_uncommitted_rows() {
    let db = TestDb::new("ambient").await;
    let p1 = db.project("p1").await;

    let mut tx = db.pool.begin().await.unwrap();
    sqlx::query(
        "INSERT INTO instances (project_id, name, type, architecture, creation_date) \
         VALUES (?, 'pending', 1, 'aarch64', '2024-05-01T12:00:00Z')",
    )
    .bind(p1)
    .execute(&mut *tx)
    .await
    .unwrap();

    // 1. Inside the transaction the new row is visible
    let mut model = Model::from_pool(db.pool.clone());
    model.attach(tx);
    assert!(model.has_ambient());
    let pending = model.instance("p1", "pending").await.unwrap();
    assert_eq!(pending.architecture, "aarch64");

    // 2. The caller still owns the transaction
    let tx = model.detach().unwrap();
    tx.rollback().await.unwrap();

    // 3. A fresh model reading committed state does not see it
    let mut fresh = Model::from_pool(db.pool.clone());
    let err = fresh.instance("p1", "pending").await.unwrap_err();
    assert!(err.is_not_found());

    drop(model);
    drop(fresh);
    db.cleanup().await;
}

#[tokio::test]
async fn test_network_and_image_full_views() {
    let db = TestDb::new("full_views").await;
    let p1 = db.project("p1").await;
    let n1 = db.node("node1").await;
    let n2 = db.node("node2").await;

    let br0 = db.network(p1, "br0").await;
    db.network_config(br0, "ipv4.address", "10.0.0.1/24").await;
    db.network_node(br0, n2, PlacementState::Created.code()).await;
    db.network_node(br0, n1, PlacementState::Pending.code()).await;
    db.network(p1, "br1").await;

    let img = db.image(p1, "abc123").await;
    db.image_property(img, "os", "debian").await;
    db.image_node(img, n1).await;

    let mut model = Model::from_pool(db.pool.clone());

    // 1. Network config and placements, nodes sorted by name
    let full = model.network_full("p1", "br0").await.unwrap();
    assert_eq!(full.config["ipv4.address"], "10.0.0.1/24");
    let nodes: Vec<&str> = full.nodes.iter().map(|p| p.node.as_str()).collect();
    assert_eq!(nodes, ["node1", "node2"]);
    assert_eq!(full.nodes[0].state, PlacementState::Pending);

    // 2. Networks without config or placements still compose
    let all = model.networks_full("p1").await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[1].config.is_empty());
    assert!(all[1].nodes.is_empty());

    // 3. Images are looked up by fingerprint
    let image = model.image_full("p1", "abc123").await.unwrap();
    assert_eq!(image.properties["os"], "debian");
    assert_eq!(image.nodes.len(), 1);
    assert!(image.image.public);
    assert_eq!(model.images("p1").await.unwrap().len(), 1);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_profiles_full_lists_devices() {
    let db = TestDb::new("profiles_full").await;
    let p1 = db.project("p1").await;
    let default = db.profile(p1, "default").await;
    db.profile_config(default, "boot.autostart", "true").await;
    let root = db.profile_device(default, "root", DeviceType::Disk).await;
    db.profile_device_config(root, "pool", "local").await;
    db.profile(p1, "empty").await;

    let mut model = Model::from_pool(db.pool.clone());
    let profiles = model.profiles_full("p1").await.unwrap();
    assert_eq!(profiles.len(), 2);

    let default = &profiles[0];
    assert_eq!(default.profile.name, "default");
    assert_eq!(default.devices["root"].config, config(&[("pool", "local")]));
    assert!(profiles[1].devices.is_empty());

    let single = model.profile_full("p1", "default").await.unwrap();
    assert_eq!(&single, default);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_authz_records_use_store_ids() {
    let db = TestDb::new("authz").await;
    let p1 = db.project("p1").await;
    let c1 = db.instance(p1, "c1").await;
    let admins = db.auth_group("admins").await;

    let mut model = Model::from_pool(db.pool.clone());

    let instances = model.authz_records(EntityKind::Instance).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].id, c1);
    assert_eq!(instances[0].project_id, Some(p1));
    assert_eq!(instances[0].url, "/1.0/instances/c1?project=p1");

    let groups = model.authz_records(EntityKind::AuthGroup).await.unwrap();
    assert_eq!(groups[0].id, admins);
    assert_eq!(groups[0].project_id, None);

    assert!(model.authz_records(EntityKind::Server).await.unwrap().is_empty());

    for kind in EntityKind::ALL {
        let records = model.authz_records(kind).await.unwrap();
        assert!(records.iter().all(|r| r.kind == kind));
    }

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_pool_is_a_transaction_provider() {
    let db = TestDb::new("provider").await;
    db.project("p1").await;

    let provider: &dyn TransactionProvider = &db.pool;
    let mut tx = provider.begin().await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(&mut *tx)
        .await
        .unwrap();
    assert_eq!(count, 1);
    tx.commit().await.unwrap();

    db.cleanup().await;
}

#[tokio::test]
async fn test_cached_full_views_do_not_touch_the_store() {
    let db = TestDb::new("cached_full").await;
    let p1 = db.project("p1").await;
    let default = db.profile(p1, "default").await;
    db.profile_config(default, "limits.cpu", "2").await;
    let eth0 = db.profile_device(default, "eth0", DeviceType::Nic).await;
    db.profile_device_config(eth0, "nictype", "bridged").await;
    let c1 = db.instance(p1, "c1").await;
    db.instance_config(c1, "user.tag", "web").await;
    db.apply_profile(c1, default, 0).await;
    db.instance(p1, "c2").await;
    db.network(p1, "br0").await;

    let mut model = Model::from_pool(db.pool.clone());

    // 1. Warm every scope the views need
    let listed = model.instances_full("p1").await.unwrap();
    let single = model.instance_full("p1", "c1").await.unwrap();
    let network = model.network_full("p1", "br0").await.unwrap();

    // 2. With the store gone, the same calls are answered from memory
    db.pool.close().await;
    assert_eq!(model.instances_full("p1").await.unwrap(), listed);
    assert_eq!(model.instance_full("p1", "c1").await.unwrap(), single);
    assert_eq!(model.network_full("p1", "br0").await.unwrap(), network);

    let expanded = model.expand(ExpansionStrategy::Manual, "p1").await.unwrap();
    assert_eq!(expanded[0].expansion, single.expanded);

    drop(model);
    db.cleanup().await;
}

#[tokio::test]
async fn test_fully_loaded_project_answers_misses_without_querying() {
    let db = TestDb::new("loaded_project").await;
    let p1 = db.project("p1").await;
    db.instance(p1, "c1").await;

    let mut model = Model::from_pool(db.pool.clone());

    // 1. Load the whole project scope
    assert_eq!(model.instances("p1").await.unwrap().len(), 1);

    // 2. Any further query would fail on the closed pool
    db.pool.close().await;

    let err = model.instance("p1", "ghost").await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert_eq!(model.instance("p1", "c1").await.unwrap().id, 1);
    assert_eq!(model.instances("p1").await.unwrap().len(), 1);

    drop(model);
    db.cleanup().await;
}
