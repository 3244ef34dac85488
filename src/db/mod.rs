//! Database module: schema, row models and the transaction seam.
//!
//! Layout:
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `models.rs`: Rust structs mirroring DB rows
//! - `codes.rs`: integer type/state codes decoded at the row boundary
//! - `pool.rs`: pool bootstrap
//! - `tx.rs`: `TransactionProvider`

pub mod codes;
pub mod models;
pub mod pool;
pub mod schema;
pub mod tx;

pub use codes::{DeviceType, InstanceType, NetworkType, PlacementState, UnknownCode};
pub use models::{
    AuthGroup, Device, Image, Instance, InstanceProfile, Network, Placement, Profile, Project,
};
pub use pool::{apply_schema, connect};
pub use schema::SQLITE_INIT;
pub use tx::{StoreTx, TransactionProvider};
