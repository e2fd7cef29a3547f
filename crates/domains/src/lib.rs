//! # domains
//!
//! The shared contracts of Sanctuary: the Post, Profile, Reaction and
//! Pagination value objects, the wire payloads exchanged with clients,
//! the error taxonomy, and the port traits every adapter implements.
//!
//! This crate performs no I/O.

pub mod contracts;
pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
