#![allow(dead_code)]

use metacache::db::{DeviceType, connect};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// A throwaway SQLite file with the schema applied.
pub struct TestDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl TestDb {
    pub async fn new(tag: &str) -> Self {
        let db_path = std::env::temp_dir().join(format!(
            "metacache_{tag}_{}.sqlite",
            uuid::Uuid::new_v4().simple()
        ));
        let database_url = format!("sqlite:{}", db_path.to_str().unwrap());
        let pool = connect(&database_url, Duration::from_secs(5)).await.unwrap();
        Self {
            pool,
            path: db_path,
        }
    }

    pub async fn cleanup(self) {
        self.pool.close().await;
        let wal_path = PathBuf::from(format!("{}-wal", self.path.to_string_lossy()));
        let shm_path = PathBuf::from(format!("{}-shm", self.path.to_string_lossy()));
        let _ = fs::remove_file(&wal_path).await;
        let _ = fs::remove_file(&shm_path).await;
        fs::remove_file(&self.path).await.unwrap();
    }

    async fn insert(&self, sql: &str, binds: &[Bind<'_>]) -> i64 {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = match *bind {
                Bind::Int(v) => query.bind(v),
                Bind::Text(v) => query.bind(v.to_string()),
            };
        }
        query
            .execute(&self.pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn node(&self, name: &str) -> i64 {
        self.insert(
            "INSERT INTO nodes (name, address) VALUES (?, ?)",
            &[Bind::Text(name), Bind::Text("10.0.0.1:8443")],
        )
        .await
    }

    pub async fn project(&self, name: &str) -> i64 {
        self.insert(
            "INSERT INTO projects (name) VALUES (?)",
            &[Bind::Text(name)],
        )
        .await
    }

    pub async fn network(&self, project_id: i64, name: &str) -> i64 {
        self.insert(
            "INSERT INTO networks (project_id, name, type, state) VALUES (?, ?, 0, 1)",
            &[Bind::Int(project_id), Bind::Text(name)],
        )
        .await
    }

    pub async fn network_config(&self, network_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO networks_config (network_id, key, value) VALUES (?, ?, ?)",
            &[Bind::Int(network_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn network_node(&self, network_id: i64, node_id: i64, state: i64) {
        self.insert(
            "INSERT INTO networks_nodes (network_id, node_id, state) VALUES (?, ?, ?)",
            &[Bind::Int(network_id), Bind::Int(node_id), Bind::Int(state)],
        )
        .await;
    }

    pub async fn image(&self, project_id: i64, fingerprint: &str) -> i64 {
        self.insert(
            "INSERT INTO images (project_id, fingerprint, filename, size, public, architecture, \
             type, creation_date) VALUES (?, ?, 'rootfs.tar.xz', 1024, 1, 'x86_64', 0, \
             '2024-05-01T12:00:00Z')",
            &[Bind::Int(project_id), Bind::Text(fingerprint)],
        )
        .await
    }

    pub async fn image_property(&self, image_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO images_properties (image_id, key, value) VALUES (?, ?, ?)",
            &[Bind::Int(image_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn image_node(&self, image_id: i64, node_id: i64) {
        self.insert(
            "INSERT INTO images_nodes (image_id, node_id, state) VALUES (?, ?, 1)",
            &[Bind::Int(image_id), Bind::Int(node_id)],
        )
        .await;
    }

    pub async fn profile(&self, project_id: i64, name: &str) -> i64 {
        self.insert(
            "INSERT INTO profiles (project_id, name) VALUES (?, ?)",
            &[Bind::Int(project_id), Bind::Text(name)],
        )
        .await
    }

    pub async fn profile_config(&self, profile_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO profiles_config (profile_id, key, value) VALUES (?, ?, ?)",
            &[Bind::Int(profile_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn profile_device(&self, profile_id: i64, name: &str, device_type: DeviceType) -> i64 {
        self.insert(
            "INSERT INTO profiles_devices (profile_id, name, type) VALUES (?, ?, ?)",
            &[
                Bind::Int(profile_id),
                Bind::Text(name),
                Bind::Int(device_type.code()),
            ],
        )
        .await
    }

    pub async fn profile_device_config(&self, device_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO profiles_devices_config (profile_device_id, key, value) VALUES (?, ?, ?)",
            &[Bind::Int(device_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn instance(&self, project_id: i64, name: &str) -> i64 {
        self.insert(
            "INSERT INTO instances (project_id, name, type, architecture, creation_date) \
             VALUES (?, ?, 0, 'x86_64', '2024-05-01T12:00:00Z')",
            &[Bind::Int(project_id), Bind::Text(name)],
        )
        .await
    }

    pub async fn instance_config(&self, instance_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO instances_config (instance_id, key, value) VALUES (?, ?, ?)",
            &[Bind::Int(instance_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn instance_device(
        &self,
        instance_id: i64,
        name: &str,
        device_type: DeviceType,
    ) -> i64 {
        self.insert(
            "INSERT INTO instances_devices (instance_id, name, type) VALUES (?, ?, ?)",
            &[
                Bind::Int(instance_id),
                Bind::Text(name),
                Bind::Int(device_type.code()),
            ],
        )
        .await
    }

    pub async fn instance_device_config(&self, device_id: i64, key: &str, value: &str) {
        self.insert(
            "INSERT INTO instances_devices_config (instance_device_id, key, value) \
             VALUES (?, ?, ?)",
            &[Bind::Int(device_id), Bind::Text(key), Bind::Text(value)],
        )
        .await;
    }

    pub async fn apply_profile(&self, instance_id: i64, profile_id: i64, apply_order: i64) -> i64 {
        self.insert(
            "INSERT INTO instances_profiles (instance_id, profile_id, apply_order) VALUES (?, ?, ?)",
            &[
                Bind::Int(instance_id),
                Bind::Int(profile_id),
                Bind::Int(apply_order),
            ],
        )
        .await
    }

    pub async fn auth_group(&self, name: &str) -> i64 {
        self.insert(
            "INSERT INTO auth_groups (name) VALUES (?)",
            &[Bind::Text(name)],
        )
        .await
    }
}

enum Bind<'a> {
    Int(i64),
    Text(&'a str),
}
