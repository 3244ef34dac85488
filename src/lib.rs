pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod expand;
pub mod materialize;
pub mod model;
pub mod utils;

pub use authz::AuthzRecord;
pub use error::{CacheError, CacheResult, IsRetryable};
pub use expand::{Expander, ExpansionStrategy, InstanceExpansion};
pub use metacache_entity::{EntityKind, EntityRef, Identity};
pub use model::Model;
