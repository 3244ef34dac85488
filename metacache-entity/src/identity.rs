use crate::{kind::EntityKind, reference::EntityRef};

/// Identity capability every cached entity exposes to the authorization layer.
///
/// `id` must be the store's own primary key; it is never reassigned for the
/// lifetime of the row.
pub trait Identity {
    fn id(&self) -> i64;

    fn entity_ref(&self) -> EntityRef;

    fn kind(&self) -> EntityKind {
        self.entity_ref().kind()
    }

    fn parent(&self) -> Option<EntityRef> {
        self.entity_ref().parent()
    }

    fn url(&self) -> String {
        self.entity_ref().url()
    }
}
