//! `Cached` and `Identity` implementations for every cached row type.
//!
//! This sits in the `cache` module because it carries the SQL of each kind.

use metacache_entity::{EntityKind, EntityRef, Identity};

use crate::cache::scoped::Cached;
use crate::db::{AuthGroup, Image, Instance, Network, Profile, Project};

impl Identity for Project {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::Project {
            name: self.name.clone(),
        }
    }
}

impl Cached for Project {
    const KIND: EntityKind = EntityKind::Project;
    const SELECT: &'static str =
        "SELECT projects.id, projects.name, projects.description FROM projects";
    const ID_COLUMN: &'static str = "projects.id";
    const NAME_COLUMN: &'static str = "projects.name";
    const PROJECT_COLUMN: Option<&'static str> = None;

    fn scope_name(&self) -> &str {
        &self.name
    }

    fn scope_project(&self) -> Option<i64> {
        None
    }
}

impl Identity for Network {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::Network {
            project: self.project.clone(),
            name: self.name.clone(),
        }
    }
}

impl Cached for Network {
    const KIND: EntityKind = EntityKind::Network;
    const SELECT: &'static str = r#"SELECT networks.id, networks.project_id, projects.name AS project,
        networks.name, networks.description, networks.type, networks.state
        FROM networks JOIN projects ON projects.id = networks.project_id"#;
    const ID_COLUMN: &'static str = "networks.id";
    const NAME_COLUMN: &'static str = "networks.name";
    const PROJECT_COLUMN: Option<&'static str> = Some("networks.project_id");

    fn scope_name(&self) -> &str {
        &self.name
    }

    fn scope_project(&self) -> Option<i64> {
        Some(self.project_id)
    }
}

impl Identity for Image {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::Image {
            project: self.project.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl Cached for Image {
    const KIND: EntityKind = EntityKind::Image;
    const SELECT: &'static str = r#"SELECT images.id, images.project_id, projects.name AS project,
        images.fingerprint, images.filename, images.size, images.public, images.architecture,
        images.type, images.creation_date, images.expiry_date
        FROM images JOIN projects ON projects.id = images.project_id"#;
    const ID_COLUMN: &'static str = "images.id";
    const NAME_COLUMN: &'static str = "images.fingerprint";
    const PROJECT_COLUMN: Option<&'static str> = Some("images.project_id");

    fn scope_name(&self) -> &str {
        &self.fingerprint
    }

    fn scope_project(&self) -> Option<i64> {
        Some(self.project_id)
    }
}

impl Identity for Profile {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::Profile {
            project: self.project.clone(),
            name: self.name.clone(),
        }
    }
}

impl Cached for Profile {
    const KIND: EntityKind = EntityKind::Profile;
    const SELECT: &'static str = r#"SELECT profiles.id, profiles.project_id, projects.name AS project,
        profiles.name, profiles.description
        FROM profiles JOIN projects ON projects.id = profiles.project_id"#;
    const ID_COLUMN: &'static str = "profiles.id";
    const NAME_COLUMN: &'static str = "profiles.name";
    const PROJECT_COLUMN: Option<&'static str> = Some("profiles.project_id");

    fn scope_name(&self) -> &str {
        &self.name
    }

    fn scope_project(&self) -> Option<i64> {
        Some(self.project_id)
    }
}

impl Identity for Instance {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::Instance {
            project: self.project.clone(),
            name: self.name.clone(),
        }
    }
}

impl Cached for Instance {
    const KIND: EntityKind = EntityKind::Instance;
    const SELECT: &'static str = r#"SELECT instances.id, instances.project_id, projects.name AS project,
        instances.name, nodes.name AS node, instances.type, instances.architecture,
        instances.ephemeral, instances.stateful, instances.description,
        instances.creation_date, instances.last_use_date, instances.expiry_date
        FROM instances JOIN projects ON projects.id = instances.project_id
        LEFT JOIN nodes ON nodes.id = instances.node_id"#;
    const ID_COLUMN: &'static str = "instances.id";
    const NAME_COLUMN: &'static str = "instances.name";
    const PROJECT_COLUMN: Option<&'static str> = Some("instances.project_id");

    fn scope_name(&self) -> &str {
        &self.name
    }

    fn scope_project(&self) -> Option<i64> {
        Some(self.project_id)
    }
}

impl Identity for AuthGroup {
    fn id(&self) -> i64 {
        self.id
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::AuthGroup {
            name: self.name.clone(),
        }
    }
}

impl Cached for AuthGroup {
    const KIND: EntityKind = EntityKind::AuthGroup;
    const SELECT: &'static str =
        "SELECT auth_groups.id, auth_groups.name, auth_groups.description FROM auth_groups";
    const ID_COLUMN: &'static str = "auth_groups.id";
    const NAME_COLUMN: &'static str = "auth_groups.name";
    const PROJECT_COLUMN: Option<&'static str> = None;

    fn scope_name(&self) -> &str {
        &self.name
    }

    fn scope_project(&self) -> Option<i64> {
        None
    }
}
