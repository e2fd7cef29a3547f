//! # Handlers
//!
//! Thin translation between HTTP and the services: extract, call, map.

pub mod health;
pub mod posts;
pub mod reactions;

use domains::PostId;

use crate::error::ApiError;

/// Path ids that are not UUIDs cannot name a post.
fn parse_post_id(raw: &str) -> Result<PostId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("post {raw} not found")))
}
