//! # Optimistic reactions
//!
//! A [`ReactionEngine`] holds one post's reaction summary for the signed-in
//! user. Toggles apply locally first and reconcile with the server answer.
//!
//! # Developer Note
//! Requests carry the desired state rather than "flip", so two rapid toggles
//! on the same type settle on the last intent. While toggles of a type are in
//! flight the engine remembers the last state the server is known to hold for
//! it. A failure only rolls back once nothing else of that type is pending,
//! and then it restores that remembered state, so a burst of failed toggles
//! never leaves an optimistic change behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use domains::{PostId, ReactionCounts, ReactionSummary, ReactionType, ToggleOutcome};
use tracing::{debug, warn};

use crate::api::FeedApi;
use crate::error::ClientError;

#[derive(Debug, Default)]
struct EngineState {
    summary: ReactionSummary,
    in_flight: HashMap<ReactionType, usize>,
    /// Last known server state `(active, count)` of each type with toggles
    /// in flight.
    settled: HashMap<ReactionType, (bool, u64)>,
}

pub struct ReactionEngine {
    api: Arc<dyn FeedApi>,
    post_id: PostId,
    state: Mutex<EngineState>,
}

impl ReactionEngine {
    /// Starts from the empty summary so the UI can render before [`load`]
    /// completes.
    ///
    /// [`load`]: ReactionEngine::load
    pub fn new(api: Arc<dyn FeedApi>, post_id: PostId) -> Self {
        Self { api, post_id, state: Mutex::new(EngineState::default()) }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    /// Fetches the server summary. Ignored for types with a toggle in flight.
    pub async fn load(&self) -> Result<ReactionSummary, ClientError> {
        let fetched = self.api.reaction_summary(self.post_id).await?;
        let mut state = self.state();
        for kind in ReactionType::ALL {
            if state.in_flight.get(&kind).copied().unwrap_or(0) == 0 {
                state.summary.counts.set(kind, fetched.counts.get(kind));
                state.summary.user_reactions.set(kind, fetched.user_reactions.get(kind));
            }
        }
        Ok(state.summary)
    }

    pub fn summary(&self) -> ReactionSummary {
        self.state().summary
    }

    pub fn counts(&self) -> ReactionCounts {
        self.state().summary.counts
    }

    pub fn is_active(&self, kind: ReactionType) -> bool {
        self.state().summary.user_reactions.get(kind)
    }

    /// Whether a toggle of `kind` is still waiting for the server.
    pub fn is_pending(&self, kind: ReactionType) -> bool {
        self.state().in_flight.get(&kind).copied().unwrap_or(0) > 0
    }

    /// Flips `kind` locally, then asks the server for the new state.
    ///
    /// On success the server counts replace the local ones. On failure, once
    /// no other toggle of `kind` is pending, the boolean and counter for
    /// `kind` return to the last state the server confirmed.
    pub async fn toggle(&self, kind: ReactionType) -> Result<ToggleOutcome, ClientError> {
        let desired = {
            let mut state = self.state();
            let previous_active = state.summary.user_reactions.get(kind);
            let previous_count = state.summary.counts.get(kind);
            let desired = !previous_active;

            let in_flight = state.in_flight.entry(kind).or_insert(0);
            *in_flight += 1;
            if *in_flight == 1 {
                state.settled.insert(kind, (previous_active, previous_count));
            }

            state.summary.user_reactions.set(kind, desired);
            state.summary.counts.adjust(kind, desired);
            desired
        };

        let result = self.api.toggle_reaction(self.post_id, kind, desired).await;

        let mut state = self.state();
        let remaining = match state.in_flight.get_mut(&kind) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        match result {
            Ok(outcome) => {
                state.summary.counts = outcome.counts;
                if remaining == 0 {
                    state.settled.remove(&kind);
                    state.summary.user_reactions.set(kind, outcome.active);
                } else {
                    state.settled.insert(kind, (outcome.active, outcome.counts.get(kind)));
                }
                debug!(post_id = %self.post_id, reaction = kind.as_str(), active = outcome.active, "reaction confirmed");
                Ok(outcome)
            }
            Err(err) => {
                let rolled_back = remaining == 0;
                if rolled_back {
                    if let Some((active, count)) = state.settled.remove(&kind) {
                        state.summary.user_reactions.set(kind, active);
                        state.summary.counts.set(kind, count);
                    }
                }
                warn!(
                    post_id = %self.post_id,
                    reaction = kind.as_str(),
                    rolled_back,
                    pending = remaining,
                    error = %err,
                    "reaction toggle failed"
                );
                Err(err)
            }
        }
    }
}
