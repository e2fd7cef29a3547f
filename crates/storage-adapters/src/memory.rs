//! In-memory implementation of every persistence port.
//!
//! Each map shard is locked only for the duration of a single operation, so
//! status transitions and reaction toggles stay atomic per post.

use std::cmp::Reverse;
use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    DomainError, NewPost, PageQuery, Post, PostId, PostRepository, PostView, Profile, ProfileId,
    ProfileRepository, ReactionCounts, ReactionIntent, ReactionRepository, ReactionType,
    Transition, UserReactionState,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: DashMap<ProfileId, Profile>,
    posts: DashMap<PostId, Post>,
    reactions: DashMap<PostId, HashSet<(ProfileId, ReactionType)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile. Profiles are owned by the identity system, so
    /// this is only used for seeding.
    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Number of stored posts in any state.
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    fn view(&self, post: Post) -> PostView {
        let author = self.profiles.get(&post.author_id).map(|entry| entry.value().clone());
        PostView { post, author }
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, DomainError> {
        Ok(self.profiles.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert_pending(&self, new: NewPost) -> Result<Post, DomainError> {
        let post = Post::pending(new);
        if self.posts.contains_key(&post.id) {
            return Err(DomainError::Persistence(format!("duplicate post id {}", post.id)));
        }
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn transition(
        &self,
        id: PostId,
        transition: Transition,
    ) -> Result<Option<Post>, DomainError> {
        let Some(mut entry) = self.posts.get_mut(&id) else {
            return Ok(None);
        };
        Ok(entry.apply(transition).then(|| entry.clone()))
    }

    async fn record_verdict(
        &self,
        id: PostId,
        passed: bool,
        rationale: Vec<String>,
    ) -> Result<(), DomainError> {
        let mut entry = self.posts.get_mut(&id).ok_or(DomainError::PostNotFound(id))?;
        entry.moderation_passed = Some(passed);
        entry.moderation_rationale = Some(rationale);
        Ok(())
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, DomainError> {
        Ok(self.posts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_approved(&self, query: PageQuery) -> Result<Vec<PostView>, DomainError> {
        let mut approved: Vec<Post> = self
            .posts
            .iter()
            .filter(|entry| entry.is_visible())
            .map(|entry| entry.value().clone())
            .collect();
        approved.sort_by_key(|post| (Reverse(post.created_at), Reverse(post.id)));

        let limit = query.limit() as usize;
        let selected: Vec<Post> = match query {
            PageQuery::Latest { offset, .. } => {
                approved.into_iter().skip(offset as usize).take(limit).collect()
            }
            PageQuery::Before { cursor, .. } => approved
                .into_iter()
                .filter(|post| cursor.admits(post.created_at, post.id))
                .take(limit)
                .collect(),
            PageQuery::Since { marker, .. } => {
                // Oldest first so a burst larger than one page is drained in order.
                let mut newer: Vec<Post> = approved
                    .into_iter()
                    .rev()
                    .filter(|post| post.created_at > marker)
                    .take(limit)
                    .collect();
                newer.reverse();
                newer
            }
        };

        Ok(selected.into_iter().map(|post| self.view(post)).collect())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[async_trait]
impl ReactionRepository for MemoryStore {
    async fn apply(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
        kind: ReactionType,
        intent: ReactionIntent,
    ) -> Result<bool, DomainError> {
        let mut set = self.reactions.entry(post_id).or_default();
        let key = (user_id.clone(), kind);
        let active = intent.resolve(set.contains(&key));
        if active {
            set.insert(key);
        } else {
            set.remove(&key);
        }
        Ok(active)
    }

    async fn counts(&self, post_id: PostId) -> Result<ReactionCounts, DomainError> {
        let mut counts = ReactionCounts::default();
        if let Some(set) = self.reactions.get(&post_id) {
            for (_, kind) in set.iter() {
                counts.adjust(*kind, true);
            }
        }
        Ok(counts)
    }

    async fn user_state(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
    ) -> Result<UserReactionState, DomainError> {
        let mut state = UserReactionState::default();
        if let Some(set) = self.reactions.get(&post_id) {
            for (owner, kind) in set.iter() {
                if owner == user_id {
                    state.set(*kind, true);
                }
            }
        }
        Ok(state)
    }
}
