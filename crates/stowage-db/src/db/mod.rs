//! Configuration persistence.
//!
//! `ConfigStore` is implemented by an in-memory arena and by Postgres. Both route default-flag
//! transitions through `OwnerRecordSet`.

pub mod memory;
pub mod owner_set;
pub mod postgres;
pub mod store;
pub mod transaction;

pub use memory::MemoryConfigStore;
pub use owner_set::{OwnerRecordSet, Removal};
pub use postgres::PgConfigStore;
pub use store::ConfigStore;
pub use transaction::begin_owner_scoped;
