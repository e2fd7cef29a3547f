//! # feed-client
//!
//! Client-side half of the feed: an HTTP binding of the API, the timeline
//! synchronizer (backfill, incremental polling, de-duplicating merge) and the
//! optimistic reaction engine.

pub mod api;
pub mod error;
pub mod reactions;
pub mod timeline;

pub use api::{FeedApi, HttpFeedApi, SubmitOutcome};
pub use error::ClientError;
pub use reactions::ReactionEngine;
pub use timeline::{TimelineState, TimelineSync, DEFAULT_POLL_INTERVAL};

#[cfg(any(test, feature = "testing"))]
pub use api::MockFeedApi;
