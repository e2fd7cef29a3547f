//! Request and response bodies shared by the HTTP API and the feed client.

use serde::{Deserialize, Serialize};

use crate::models::Post;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPostRequest {
    pub content: String,
}

/// 201 body of a published post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPostResponse {
    pub message: String,
    pub post: Post,
}

/// 400 body of a post the judge turned down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRejection {
    pub message: String,
    pub rejection_reasons: Vec<String>,
    /// One friendly paraphrase per rejection reason.
    pub user_message: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_content: Option<String>,
}

/// Body of a toggle request. Fields stay loose so the handler can answer
/// with its own validation messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReactionRequest {
    pub reaction_type: Option<String>,
    /// Desired state. Absent means flip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}
