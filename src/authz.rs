//! Flat entity records handed to the authorization layer.

use metacache_entity::{EntityKind, EntityRef};
use serde::Serialize;

use crate::cache::Cached;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthzRecord {
    /// Primary key of the row in the store.
    pub id: i64,
    pub kind: EntityKind,
    /// Owning project id; `None` for global kinds.
    pub project_id: Option<i64>,
    pub entity: EntityRef,
    pub url: String,
}

impl AuthzRecord {
    pub fn from_entity<E: Cached>(entity: &E) -> Self {
        let reference = entity.entity_ref();
        Self {
            id: entity.id(),
            kind: E::KIND,
            project_id: entity.scope_project(),
            url: reference.url(),
            entity: reference,
        }
    }
}
