//! # services
//!
//! Application logic of Sanctuary, written purely against the ports in
//! `domains`:
//!
//! - [`moderation`]: validate, sanitize, judge and persist submitted posts.
//! - [`timeline`]: parse paging parameters and read approved posts.
//! - [`reactions`]: atomic per-user reaction toggles and aggregates.

pub mod clock;
pub mod moderation;
pub mod reactions;
pub mod timeline;

pub use clock::SystemClock;
pub use moderation::{ModerationPolicy, ModerationService, RejectedSubmission, Submission};
pub use reactions::ReactionService;
pub use timeline::{RawPageParams, TimelineService};
