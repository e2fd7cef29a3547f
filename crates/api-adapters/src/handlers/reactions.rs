use axum::extract::{Path, State};
use domains::contracts::ToggleReactionRequest;
use domains::{DomainError, ReactionIntent, ReactionSummary, ReactionType, ToggleOutcome};

use super::parse_post_id;
use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, Json, MaybeUser};
use crate::state::AppState;

/// `GET /api/posts/{post_id}/reactions`
pub async fn reaction_summary(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<String>,
) -> Result<Json<ReactionSummary>, ApiError> {
    let post_id = parse_post_id(&post_id)?;
    let summary = state.reactions.summary(post_id, viewer.as_ref()).await?;
    Ok(Json(summary))
}

/// `POST /api/posts/{post_id}/reactions` with `{ reactionType, active? }`
pub async fn toggle_reaction(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<String>,
    Json(body): Json<ToggleReactionRequest>,
) -> Result<Json<ToggleOutcome>, ApiError> {
    let post_id = parse_post_id(&post_id)?;
    let kind = match body.reaction_type.as_deref().map(str::trim) {
        None | Some("") => return Err(DomainError::InvalidReactionType("missing".into()).into()),
        Some(raw) => raw.parse::<ReactionType>()?,
    };

    let outcome = state
        .reactions
        .toggle(post_id, &user, kind, ReactionIntent::from(body.active))
        .await?;
    state.metrics.record_toggle(kind.as_str());
    Ok(Json(outcome))
}
