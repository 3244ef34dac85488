//! SQL DDL for initializing the metadata schema.
//! SQLite-first design; every statement is idempotent.

/// SQLite schema includes:
/// - `nodes` (cluster members)
/// - `projects` and the project-owned `networks`, `images`, `profiles`, `instances`
/// - key/value side tables (`*_config`, `images_properties`)
/// - devices and their own config tables, keyed by the device row id
/// - `instances_profiles` (apply order) and node placements (`*_nodes`)
/// - `auth_groups`
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    UNIQUE(name)
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);

-- ---------------------------------------------------------------------------
-- Networks
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS networks (
    id INTEGER PRIMARY KEY NOT NULL,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    type INTEGER NOT NULL DEFAULT 0,
    state INTEGER NOT NULL DEFAULT 0,
    UNIQUE(project_id, name)
);

CREATE TABLE IF NOT EXISTS networks_config (
    id INTEGER PRIMARY KEY NOT NULL,
    network_id INTEGER NOT NULL REFERENCES networks(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(network_id, key)
);

CREATE TABLE IF NOT EXISTS networks_nodes (
    id INTEGER PRIMARY KEY NOT NULL,
    network_id INTEGER NOT NULL REFERENCES networks(id) ON DELETE CASCADE,
    node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    state INTEGER NOT NULL DEFAULT 0,
    UNIQUE(network_id, node_id)
);

-- ---------------------------------------------------------------------------
-- Images
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY NOT NULL,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    fingerprint TEXT NOT NULL,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL,
    public INTEGER NOT NULL DEFAULT 0,
    architecture TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 0,
    creation_date TEXT NOT NULL, -- RFC3339
    expiry_date TEXT NULL, -- RFC3339
    UNIQUE(project_id, fingerprint)
);

CREATE TABLE IF NOT EXISTS images_properties (
    id INTEGER PRIMARY KEY NOT NULL,
    image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(image_id, key)
);

CREATE TABLE IF NOT EXISTS images_nodes (
    id INTEGER PRIMARY KEY NOT NULL,
    image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    state INTEGER NOT NULL DEFAULT 0,
    UNIQUE(image_id, node_id)
);

-- ---------------------------------------------------------------------------
-- Profiles
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY NOT NULL,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    UNIQUE(project_id, name)
);

CREATE TABLE IF NOT EXISTS profiles_config (
    id INTEGER PRIMARY KEY NOT NULL,
    profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(profile_id, key)
);

CREATE TABLE IF NOT EXISTS profiles_devices (
    id INTEGER PRIMARY KEY NOT NULL,
    profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 0,
    UNIQUE(profile_id, name)
);

CREATE TABLE IF NOT EXISTS profiles_devices_config (
    id INTEGER PRIMARY KEY NOT NULL,
    profile_device_id INTEGER NOT NULL REFERENCES profiles_devices(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(profile_device_id, key)
);

-- ---------------------------------------------------------------------------
-- Instances
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS instances (
    id INTEGER PRIMARY KEY NOT NULL,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    node_id INTEGER NULL REFERENCES nodes(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 0,
    architecture TEXT NOT NULL,
    ephemeral INTEGER NOT NULL DEFAULT 0,
    stateful INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    creation_date TEXT NOT NULL, -- RFC3339
    last_use_date TEXT NULL, -- RFC3339
    expiry_date TEXT NULL, -- RFC3339
    UNIQUE(project_id, name)
);

CREATE TABLE IF NOT EXISTS instances_config (
    id INTEGER PRIMARY KEY NOT NULL,
    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(instance_id, key)
);

CREATE TABLE IF NOT EXISTS instances_devices (
    id INTEGER PRIMARY KEY NOT NULL,
    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 0,
    UNIQUE(instance_id, name)
);

CREATE TABLE IF NOT EXISTS instances_devices_config (
    id INTEGER PRIMARY KEY NOT NULL,
    instance_device_id INTEGER NOT NULL REFERENCES instances_devices(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE(instance_device_id, key)
);

CREATE TABLE IF NOT EXISTS instances_profiles (
    id INTEGER PRIMARY KEY NOT NULL,
    instance_id INTEGER NOT NULL REFERENCES instances(id) ON DELETE CASCADE,
    profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    apply_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE(instance_id, profile_id)
);

CREATE INDEX IF NOT EXISTS idx_instances_profiles_instance ON instances_profiles(instance_id);

-- ---------------------------------------------------------------------------
-- Authorization groups (global)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS auth_groups (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);
"#;
