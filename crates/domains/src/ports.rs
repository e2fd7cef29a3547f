//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{AuthError, DomainError};
use crate::models::{
    JudgeError, NewPost, PageQuery, Post, PostId, PostView, Profile, ProfileId, ReactionCounts,
    ReactionIntent, ReactionType, Transition, UserReactionState, Verdict,
};

/// Read access to member profiles, which are managed elsewhere.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, DomainError>;
}

/// Persistence contract for posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Stores a new post in the pending state.
    async fn insert_pending(&self, post: NewPost) -> Result<Post, DomainError>;

    /// Moves a pending post to its final state. Returns `None` without
    /// writing if the post does not exist or is no longer pending.
    async fn transition(&self, id: PostId, transition: Transition)
        -> Result<Option<Post>, DomainError>;

    /// Attaches a judge verdict for audit without touching the status.
    async fn record_verdict(
        &self,
        id: PostId,
        passed: bool,
        rationale: Vec<String>,
    ) -> Result<(), DomainError>;

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, DomainError>;

    /// Approved posts matching `query`, newest first, ties broken by id.
    async fn list_approved(&self, query: PageQuery) -> Result<Vec<PostView>, DomainError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), DomainError>;
}

/// Persistence contract for reactions, unique per (post, user, type).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Atomically applies `intent` and returns whether the reaction is now
    /// active.
    async fn apply(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
        kind: ReactionType,
        intent: ReactionIntent,
    ) -> Result<bool, DomainError>;

    async fn counts(&self, post_id: PostId) -> Result<ReactionCounts, DomainError>;

    async fn user_state(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
    ) -> Result<UserReactionState, DomainError>;
}

/// The external AI moderation service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentJudge: Send + Sync {
    async fn judge(&self, content: &str) -> Result<Verdict, JudgeError>;
}

/// Resolves a bearer credential to the profile it was issued for.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<ProfileId, AuthError>;
}

/// Source of creation and approval timestamps.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
