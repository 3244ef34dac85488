use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::{Position, Url};

use crate::kind::EntityKind;

const API_VERSION: &str = "1.0";

// Only the path and query of this base are ever rendered.
static URL_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://metacache.invalid/").expect("static base URL is valid"));

/// Name-based reference to one entity, as the authorization layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    Server,
    Project { name: String },
    Network { project: String, name: String },
    Image { project: String, fingerprint: String },
    Profile { project: String, name: String },
    Instance { project: String, name: String },
    AuthGroup { name: String },
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Server => EntityKind::Server,
            EntityRef::Project { .. } => EntityKind::Project,
            EntityRef::Network { .. } => EntityKind::Network,
            EntityRef::Image { .. } => EntityKind::Image,
            EntityRef::Profile { .. } => EntityKind::Profile,
            EntityRef::Instance { .. } => EntityKind::Instance,
            EntityRef::AuthGroup { .. } => EntityKind::AuthGroup,
        }
    }

    /// Owning project name for project-scoped references.
    pub fn project(&self) -> Option<&str> {
        match self {
            EntityRef::Network { project, .. }
            | EntityRef::Image { project, .. }
            | EntityRef::Profile { project, .. }
            | EntityRef::Instance { project, .. } => Some(project),
            EntityRef::Server | EntityRef::Project { .. } | EntityRef::AuthGroup { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<EntityRef> {
        match self {
            EntityRef::Server => None,
            EntityRef::Project { .. } | EntityRef::AuthGroup { .. } => Some(EntityRef::Server),
            EntityRef::Network { project, .. }
            | EntityRef::Image { project, .. }
            | EntityRef::Profile { project, .. }
            | EntityRef::Instance { project, .. } => Some(EntityRef::Project {
                name: project.clone(),
            }),
        }
    }

    /// Canonical API URL, e.g. `/1.0/instances/c1?project=default`. Every
    /// name is one percent-encoded path segment.
    pub fn url(&self) -> String {
        let (segments, project): (Vec<&str>, Option<&str>) = match self {
            EntityRef::Server => (vec![API_VERSION], None),
            EntityRef::Project { name } => (vec![API_VERSION, "projects", name.as_str()], None),
            EntityRef::AuthGroup { name } => {
                (vec![API_VERSION, "auth", "groups", name.as_str()], None)
            }
            EntityRef::Network { project, name } => {
                (vec![API_VERSION, "networks", name.as_str()], Some(project.as_str()))
            }
            EntityRef::Image {
                project,
                fingerprint,
            } => (
                vec![API_VERSION, "images", fingerprint.as_str()],
                Some(project.as_str()),
            ),
            EntityRef::Profile { project, name } => {
                (vec![API_VERSION, "profiles", name.as_str()], Some(project.as_str()))
            }
            EntityRef::Instance { project, name } => {
                (vec![API_VERSION, "instances", name.as_str()], Some(project.as_str()))
            }
        };

        let mut url = URL_BASE.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        if let Some(project) = project {
            url.query_pairs_mut().append_pair("project", project);
        }
        url[Position::BeforePath..].to_string()
    }
}
