use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domains::contracts::{ModerationRejection, SubmitPostRequest, SubmitPostResponse};
use domains::{DomainError, Page};
use services::moderation::messages::{PUBLISHED_MESSAGE, REJECTED_MESSAGE};
use services::{RawPageParams, Submission};

use crate::error::ApiError;
use crate::extract::{AuthenticatedUser, Json};
use crate::state::AppState;

/// `POST /api/posts`
///
/// 201 with the stored post when it is published, 400 with the rejection
/// details when the judge turns it down (or could not be reached).
pub async fn submit_post(
    State(state): State<AppState>,
    AuthenticatedUser(author): AuthenticatedUser,
    Json(body): Json<SubmitPostRequest>,
) -> Result<Response, ApiError> {
    let submission = state.moderation.submit_post(&author, &body.content).await?;
    state.metrics.record_submission(submission.outcome_label());

    let response = match submission {
        Submission::Published(post) => (
            StatusCode::CREATED,
            Json(SubmitPostResponse { message: PUBLISHED_MESSAGE.to_string(), post }),
        )
            .into_response(),
        Submission::Rejected(rejected) => (
            StatusCode::BAD_REQUEST,
            Json(ModerationRejection {
                message: REJECTED_MESSAGE.to_string(),
                rejection_reasons: rejected.reasons,
                user_message: rejected.user_messages,
                suggested_content: rejected.suggested_content,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

/// `GET /api/posts?limit=&offset=&cursor=&cursorId=&since=`
pub async fn list_posts(
    State(state): State<AppState>,
    params: Result<Query<RawPageParams>, QueryRejection>,
) -> Result<Json<Page>, ApiError> {
    let Query(params) =
        params.map_err(|err| DomainError::InvalidPagination(err.body_text()))?;
    let page = state.timeline.list(&params).await?;
    Ok(Json(page))
}
