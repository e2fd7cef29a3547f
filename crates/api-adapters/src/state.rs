use std::sync::Arc;

use domains::{
    Clock, ContentJudge, IdentityVerifier, PostRepository, ProfileRepository, ReactionRepository,
};
use services::{ModerationPolicy, ModerationService, ReactionService, TimelineService};

use crate::metrics::Metrics;

/// Shared by every handler; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService>,
    pub timeline: Arc<TimelineService>,
    pub reactions: Arc<ReactionService>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Probed by `/health`.
    pub storage: Arc<dyn PostRepository>,
    pub metrics: Arc<Metrics>,
}

/// Adapters the services are built from.
pub struct Ports {
    pub posts: Arc<dyn PostRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub reactions: Arc<dyn ReactionRepository>,
    pub judge: Arc<dyn ContentJudge>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(ports: Ports, policy: ModerationPolicy) -> Self {
        let Ports { posts, profiles, reactions, judge, identity, clock } = ports;
        Self {
            moderation: Arc::new(ModerationService::new(
                Arc::clone(&posts),
                profiles,
                judge,
                clock,
                policy,
            )),
            timeline: Arc::new(TimelineService::new(Arc::clone(&posts))),
            reactions: Arc::new(ReactionService::new(Arc::clone(&posts), reactions)),
            identity,
            storage: posts,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
