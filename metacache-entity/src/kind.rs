use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of entity kinds surfaced to the authorization layer.
///
/// Adding a variant forces every `match` below (and in consumers) to handle it,
/// so there is no "unknown kind" path at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Server,
    Project,
    Network,
    Image,
    Profile,
    Instance,
    AuthGroup,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Server,
        EntityKind::Project,
        EntityKind::Network,
        EntityKind::Image,
        EntityKind::Profile,
        EntityKind::Instance,
        EntityKind::AuthGroup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Server => "server",
            EntityKind::Project => "project",
            EntityKind::Network => "network",
            EntityKind::Image => "image",
            EntityKind::Profile => "profile",
            EntityKind::Instance => "instance",
            EntityKind::AuthGroup => "auth_group",
        }
    }

    /// Kind of the entity one level up the permission hierarchy.
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Server => None,
            EntityKind::Project | EntityKind::AuthGroup => Some(EntityKind::Server),
            EntityKind::Network
            | EntityKind::Image
            | EntityKind::Profile
            | EntityKind::Instance => Some(EntityKind::Project),
        }
    }

    /// Whether rows of this kind live inside a project.
    pub fn is_project_scoped(self) -> bool {
        self.parent_kind() == Some(EntityKind::Project)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_reaches_server() {
        for kind in EntityKind::ALL {
            let mut current = kind;
            let mut hops = 0;
            while let Some(parent) = current.parent_kind() {
                current = parent;
                hops += 1;
                assert!(hops <= 2, "{kind} has a parent chain longer than expected");
            }
            assert_eq!(current, EntityKind::Server);
        }
    }

    #[test]
    fn project_scoped_kinds() {
        let scoped: Vec<_> = EntityKind::ALL
            .into_iter()
            .filter(|k| k.is_project_scoped())
            .collect();
        assert_eq!(
            scoped,
            vec![
                EntityKind::Network,
                EntityKind::Image,
                EntityKind::Profile,
                EntityKind::Instance
            ]
        );
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&EntityKind::AuthGroup).unwrap();
        assert_eq!(json, "\"auth_group\"");
    }
}
