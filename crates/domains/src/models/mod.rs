//! # Domain Models
//!
//! These structs represent the core entities of Sanctuary.
//! Post ids are UUID v7 so that identifiers are time-ordered and can break
//! ties between posts sharing a creation timestamp.

mod moderation;
mod post;
mod reaction;
mod timeline;

pub use moderation::*;
pub use post::*;
pub use reaction::*;
pub use timeline::*;
