//! Request extractors that answer with the API's own error bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use domains::{AuthError, DomainError, ProfileId};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Local version of [`axum::Json`] whose rejection is a 400 `{ error }`
/// body instead of axum's plain-text one.
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::BadRequest(match rejection {
                JsonRejection::JsonDataError(err) => err.body_text(),
                JsonRejection::JsonSyntaxError(err) => err.body_text(),
                JsonRejection::MissingJsonContentType(_) => "Invalid content type".to_string(),
                JsonRejection::BytesRejection(err) => err.body_text(),
                other => {
                    warn!("unhandled json rejection: {other:?}");
                    other.body_text()
                }
            })),
        }
    }
}

impl<T> IntoResponse for Json<T>
where
    T: serde::Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// The verified author of the request. Rejects with 401 when the bearer
/// token is missing or invalid.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub ProfileId);

/// Like [`AuthenticatedUser`], but anonymous requests are let through.
/// A token that is present but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<ProfileId>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("non-ascii authorization header".into()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token.trim())),
        _ => Err(AuthError::InvalidToken("expected a bearer token".into())),
    }
}

fn verify(parts: &Parts, state: &AppState) -> Result<Option<ProfileId>, ApiError> {
    let token = bearer_token(parts).map_err(|err| {
        debug!(%err, "malformed authorization header");
        ApiError::Domain(DomainError::Unauthenticated)
    })?;
    let Some(token) = token else {
        return Ok(None);
    };
    state.identity.verify(token).map(Some).map_err(|err| {
        debug!(%err, "bearer token rejected");
        ApiError::Domain(DomainError::Unauthenticated)
    })
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        verify(parts, state)?
            .map(AuthenticatedUser)
            .ok_or(ApiError::Domain(DomainError::Unauthenticated))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        verify(parts, state).map(MaybeUser)
    }
}
