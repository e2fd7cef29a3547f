//! The feed API as seen from a client.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use domains::contracts::{
    ErrorBody, ModerationRejection, SubmitPostRequest, SubmitPostResponse, ToggleReactionRequest,
};
use domains::{Page, PageCursor, Post, PostId, ReactionSummary, ReactionType, ToggleOutcome};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// What became of a submitted post.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Published(Post),
    /// Turned down by moderation; carries reasons, friendly messages and an
    /// optional rewrite the UI can offer.
    Rejected(ModerationRejection),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Backfill: the newest posts, or those past `cursor`.
    async fn fetch_page(
        &self,
        limit: u32,
        cursor: Option<PageCursor>,
    ) -> Result<Page, ClientError>;

    /// Incremental: posts strictly newer than `marker`. Without a marker this
    /// is a plain newest-first read.
    async fn fetch_since(
        &self,
        marker: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Page, ClientError>;

    async fn submit_post(&self, content: &str) -> Result<SubmitOutcome, ClientError>;

    async fn reaction_summary(&self, post_id: PostId) -> Result<ReactionSummary, ClientError>;

    /// Asks the server to put the reaction into the `active` state.
    async fn toggle_reaction(
        &self,
        post_id: PostId,
        kind: ReactionType,
        active: bool,
    ) -> Result<ToggleOutcome, ClientError>;
}

/// [`FeedApi`] over HTTP with an optional bearer token.
pub struct HttpFeedApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFeedApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list(&self, params: &[(&str, String)]) -> Result<Page, ClientError> {
        let request = self.client.get(self.url("/api/posts")).query(params);
        let response = self.authorized(request).send().await.map_err(network_error)?;
        decode_success(response).await
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn cursor_params(cursor: Option<PageCursor>) -> Vec<(&'static str, String)> {
    let Some(cursor) = cursor else {
        return Vec::new();
    };
    let mut params = vec![("cursor", timestamp(cursor.created_at))];
    if let Some(id) = cursor.id {
        params.push(("cursorId", id.to_string()));
    }
    params
}

fn network_error(err: reqwest::Error) -> ClientError {
    ClientError::Network(err.to_string())
}

async fn read_body(response: reqwest::Response) -> Result<(StatusCode, Vec<u8>), ClientError> {
    let status = response.status();
    let body = response.bytes().await.map_err(network_error)?;
    Ok((status, body.to_vec()))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(body).map_err(|err| ClientError::InvalidResponse(err.to_string()))
}

fn failure(status: StatusCode, body: &[u8]) -> ClientError {
    if status == StatusCode::UNAUTHORIZED {
        return ClientError::Unauthenticated;
    }
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
    ClientError::Api { status: status.as_u16(), message }
}

async fn decode_success<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let (status, body) = read_body(response).await?;
    if status.is_success() {
        decode(&body)
    } else {
        Err(failure(status, &body))
    }
}

#[async_trait]
impl FeedApi for HttpFeedApi {
    async fn fetch_page(
        &self,
        limit: u32,
        cursor: Option<PageCursor>,
    ) -> Result<Page, ClientError> {
        let mut params = vec![("limit", limit.to_string())];
        params.extend(cursor_params(cursor));
        self.list(&params).await
    }

    async fn fetch_since(
        &self,
        marker: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Page, ClientError> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(marker) = marker {
            params.push(("since", timestamp(marker)));
        }
        self.list(&params).await
    }

    async fn submit_post(&self, content: &str) -> Result<SubmitOutcome, ClientError> {
        let request = self
            .client
            .post(self.url("/api/posts"))
            .json(&SubmitPostRequest { content: content.to_string() });
        let response = self.authorized(request).send().await.map_err(network_error)?;
        let (status, body) = read_body(response).await?;

        if status.is_success() {
            let published: SubmitPostResponse = decode(&body)?;
            return Ok(SubmitOutcome::Published(published.post));
        }
        // A moderation rejection is a 400 with its own shape; any other 400
        // is a plain validation error.
        if status == StatusCode::BAD_REQUEST {
            if let Ok(rejection) = serde_json::from_slice::<ModerationRejection>(&body) {
                return Ok(SubmitOutcome::Rejected(rejection));
            }
        }
        Err(failure(status, &body))
    }

    async fn reaction_summary(&self, post_id: PostId) -> Result<ReactionSummary, ClientError> {
        let request = self.client.get(self.url(&format!("/api/posts/{post_id}/reactions")));
        let response = self.authorized(request).send().await.map_err(network_error)?;
        decode_success(response).await
    }

    async fn toggle_reaction(
        &self,
        post_id: PostId,
        kind: ReactionType,
        active: bool,
    ) -> Result<ToggleOutcome, ClientError> {
        let request = self
            .client
            .post(self.url(&format!("/api/posts/{post_id}/reactions")))
            .json(&ToggleReactionRequest {
                reaction_type: Some(kind.as_str().to_string()),
                active: Some(active),
            });
        let response = self.authorized(request).send().await.map_err(network_error)?;
        decode_success(response).await
    }
}
