//! # storage-adapters
//!
//! Implementations of the persistence ports in `domains`.
//!
//! - [`memory`]: lock-free in-process store, used by tests and local runs.
//! - `postgres` (feature `db-postgres`): the production store.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
