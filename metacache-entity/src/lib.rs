pub mod identity;
pub mod kind;
pub mod reference;

pub use identity::Identity;
pub use kind::EntityKind;
pub use reference::EntityRef;
