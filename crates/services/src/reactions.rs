use std::sync::Arc;

use domains::{
    DomainError, PostId, PostRepository, ProfileId, ReactionIntent, ReactionRepository,
    ReactionSummary, ReactionType, ToggleOutcome, UserReactionState,
};
use tracing::debug;

/// Reactions on visible posts.
pub struct ReactionService {
    posts: Arc<dyn PostRepository>,
    reactions: Arc<dyn ReactionRepository>,
}

impl ReactionService {
    pub fn new(posts: Arc<dyn PostRepository>, reactions: Arc<dyn ReactionRepository>) -> Self {
        Self { posts, reactions }
    }

    /// Applies `intent` for `user_id` and returns the resulting state with
    /// fresh aggregate counts.
    #[tracing::instrument(skip(self), fields(user = %user_id))]
    pub async fn toggle(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
        kind: ReactionType,
        intent: ReactionIntent,
    ) -> Result<ToggleOutcome, DomainError> {
        self.ensure_visible(post_id).await?;

        let active = self.reactions.apply(post_id, user_id, kind, intent).await?;
        let counts = self.reactions.counts(post_id).await?;
        debug!(active, count = counts.get(kind), "reaction applied");

        Ok(ToggleOutcome { reaction_type: kind, active, counts })
    }

    /// Aggregate counts plus the caller's own state; all-false for anonymous
    /// callers.
    pub async fn summary(
        &self,
        post_id: PostId,
        viewer: Option<&ProfileId>,
    ) -> Result<ReactionSummary, DomainError> {
        self.ensure_visible(post_id).await?;

        let counts = self.reactions.counts(post_id).await?;
        let user_reactions = match viewer {
            Some(user_id) => self.reactions.user_state(post_id, user_id).await?,
            None => UserReactionState::default(),
        };
        Ok(ReactionSummary { counts, user_reactions })
    }

    async fn ensure_visible(&self, post_id: PostId) -> Result<(), DomainError> {
        match self.posts.find_post(post_id).await? {
            Some(post) if post.is_visible() => Ok(()),
            _ => Err(DomainError::PostNotFound(post_id)),
        }
    }
}
